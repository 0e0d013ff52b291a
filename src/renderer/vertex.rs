use bytemuck::{Pod, Zeroable};
use std::mem;

const SQRT_3: f32 = 1.732_050_8;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

impl Vertex {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vertex {
            position: [x, y, z],
        }
    }

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: mem::size_of::<Vertex>() as u32,
            attributes: vec![VertexAttribute {
                location: 0,
                components: 3,
                offset: 0,
            }],
        }
    }
}

// Origin in the middle of the window, x to the right, y up.
pub const TRIANGLE: [Vertex; 3] = [
    Vertex::new(-0.5, -0.5 * SQRT_3 / 3.0, 0.0),
    Vertex::new(0.5, -0.5 * SQRT_3 / 3.0, 0.0),
    Vertex::new(0.0, 0.5 * SQRT_3 * 2.0 / 3.0, 0.0),
];

pub const SUBDIVIDED: [Vertex; 6] = [
    // lower left, lower right, upper
    TRIANGLE[0],
    TRIANGLE[1],
    TRIANGLE[2],
    // inner left, inner right, inner down
    Vertex::new(-0.5 / 2.0, 0.5 * SQRT_3 / 6.0, 0.0),
    Vertex::new(0.5 / 2.0, 0.5 * SQRT_3 / 6.0, 0.0),
    Vertex::new(0.0, -0.5 * SQRT_3 / 3.0, 0.0),
];

pub const SUBDIVIDED_INDICES: [u32; 9] = [0, 3, 5, 3, 2, 4, 5, 4, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    /// Number of `f32` components.
    pub components: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    Arrays {
        primitive: Primitive,
        first: u32,
        count: u32,
    },
    Indexed {
        primitive: Primitive,
        count: u32,
    },
}

impl DrawCall {
    pub fn is_indexed(&self) -> bool {
        matches!(self, DrawCall::Indexed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Geometry<'a> {
    pub vertices: &'a [Vertex],
    pub indices: Option<&'a [u32]>,
}

impl<'a> Geometry<'a> {
    pub fn new(vertices: &'a [Vertex], indices: Option<&'a [u32]>) -> Self {
        Geometry { vertices, indices }
    }

    pub fn vertex_bytes(&self) -> &'a [u8] {
        bytemuck::cast_slice(self.vertices)
    }

    // an empty index list draws the vertices directly
    fn index_list(&self) -> Option<&'a [u32]> {
        self.indices.filter(|indices| !indices.is_empty())
    }

    pub fn index_bytes(&self) -> Option<&'a [u8]> {
        self.index_list().map(bytemuck::cast_slice)
    }

    pub fn draw_call(&self) -> DrawCall {
        match self.index_list() {
            Some(indices) => DrawCall::Indexed {
                primitive: Primitive::Triangles,
                count: indices.len() as u32,
            },
            None => DrawCall::Arrays {
                primitive: Primitive::Triangles,
                first: 0,
                count: self.vertices.len() as u32,
            },
        }
    }
}
