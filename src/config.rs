use clap::{Parser, ValueEnum};

use crate::renderer::vertex::{Geometry, SUBDIVIDED, SUBDIVIDED_INDICES, TRIANGLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scene {
    /// A single triangle drawn straight from the vertex buffer.
    Triangle,
    /// The triangle split into three by its edge midpoints, drawn through an index buffer.
    Subdivided,
}

impl Scene {
    pub fn geometry(self) -> Geometry<'static> {
        match self {
            Scene::Triangle => Geometry::new(&TRIANGLE, None),
            Scene::Subdivided => Geometry::new(&SUBDIVIDED, Some(&SUBDIVIDED_INDICES[..])),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "gfx-frame-renderer", about = "Draws a triangle until the window is closed")]
pub struct Args {
    /// Geometry to upload and draw
    #[arg(long, value_enum, default_value_t = Scene::Triangle)]
    pub scene: Scene,

    /// Window width in physical pixels
    #[arg(long, default_value_t = 800)]
    pub width: u32,

    /// Window height in physical pixels
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    #[arg(long, default_value = "YoutubeOpenGL")]
    pub title: String,

    /// Read uploaded buffers back and compare them with the source arrays
    #[arg(long)]
    pub verify_upload: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::vertex::{DrawCall, Primitive};

    #[test]
    fn defaults_match_the_classic_window() {
        let args = Args::parse_from(["gfx-frame-renderer"]);
        assert_eq!(args.scene, Scene::Triangle);
        assert_eq!((args.width, args.height), (800, 800));
        assert_eq!(args.title, "YoutubeOpenGL");
        assert!(!args.verify_upload);
    }

    #[test]
    fn subdivided_scene_is_indexed() {
        let args = Args::parse_from([
            "gfx-frame-renderer",
            "--scene",
            "subdivided",
            "--width",
            "640",
            "--verify-upload",
        ]);
        assert_eq!(args.scene, Scene::Subdivided);
        assert_eq!(args.width, 640);
        assert!(args.verify_upload);
        assert_eq!(
            args.scene.geometry().draw_call(),
            DrawCall::Indexed {
                primitive: Primitive::Triangles,
                count: 9,
            }
        );
    }

    #[test]
    fn unknown_scene_is_rejected() {
        assert!(Args::try_parse_from(["gfx-frame-renderer", "--scene", "cube"]).is_err());
    }
}
