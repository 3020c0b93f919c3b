//! Scene state: panel-editable parameters plus the animation that derives
//! per-frame sprite placements from them.

use std::f32::consts::TAU;

use pictor_engine::coords::{Mat3, Vec2};
use pictor_engine::paint::Color;
use pictor_engine::render::Instance2D;

pub const MAX_ORBITERS: u32 = 64;

const ORBITER_SIZE: f32 = 48.0;

/// The sprite texture is addressed as a grid of equally sized cells; each
/// placement samples one cell through its uv transform.
pub const SHEET_COLS: u32 = 2;
pub const SHEET_ROWS: u32 = 2;

/// Everything the panel can edit. Plain data; the panel mutates it directly
/// and the next frame picks the values up.
#[derive(Debug, Clone)]
pub struct SceneParams {
    pub focus_position: Vec2,
    pub focus_scale: f32,
    pub focus_rotation: f32,
    pub focus_tint: [f32; 4],
    pub orbit_count: u32,
    pub orbit_speed: f32,
    pub orbit_radius: f32,
    /// Sheet cells advanced per second.
    pub frame_rate: f32,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            focus_position: Vec2::zero(),
            focus_scale: 160.0,
            focus_rotation: 0.0,
            focus_tint: [1.0, 1.0, 1.0, 1.0],
            orbit_count: 12,
            orbit_speed: 0.8,
            orbit_radius: 240.0,
            frame_rate: 6.0,
        }
    }
}

/// One sprite to draw: placement + tint + sheet cell. The mesh and texture
/// are shared, so this is all a scene item has to say.
#[derive(Debug, Clone)]
pub struct Placement {
    pub instance: Instance2D,
    pub tint: Color,
    pub uv_transform: Mat3,
}

/// Animation state, advanced once per frame.
#[derive(Debug, Default)]
pub struct Scene {
    angle: f32,
    sheet_time: f32,
}

impl Scene {
    pub fn advance(&mut self, dt: f32, params: &SceneParams) {
        self.angle = (self.angle + dt * params.orbit_speed).rem_euclid(TAU);
        let cells = (SHEET_COLS * SHEET_ROWS) as f32;
        self.sheet_time = (self.sheet_time + dt * params.frame_rate).rem_euclid(cells);
    }

    fn sheet_frame(&self) -> u32 {
        self.sheet_time as u32
    }

    /// Builds this frame's placements. Orbiters first, the focus sprite
    /// last so it draws on top.
    pub fn placements(&self, params: &SceneParams) -> Vec<Placement> {
        let count = params.orbit_count.min(MAX_ORBITERS);
        let mut out = Vec::with_capacity(count as usize + 1);
        let frame = self.sheet_frame();

        for i in 0..count {
            let phase = self.angle + TAU * i as f32 / count as f32;
            let (sin, cos) = phase.sin_cos();
            out.push(Placement {
                instance: Instance2D {
                    position: Vec2::new(cos * params.orbit_radius, sin * params.orbit_radius),
                    scale: Vec2::splat(ORBITER_SIZE),
                    rotation: -phase,
                },
                tint: orbiter_tint(i),
                // Stagger each orbiter's animation by one cell.
                uv_transform: sheet_cell(frame + i),
            });
        }

        let [r, g, b, a] = params.focus_tint;
        out.push(Placement {
            instance: Instance2D {
                position: params.focus_position,
                scale: Vec2::splat(params.focus_scale),
                rotation: params.focus_rotation,
            },
            tint: Color::rgba(r, g, b, a),
            uv_transform: sheet_cell(frame),
        });

        out
    }
}

/// The uv window of one sheet cell: texture coordinates in [0, 1] map onto
/// the cell's sub-rectangle. Frames count row-major and wrap.
pub fn sheet_cell(frame: u32) -> Mat3 {
    let frame = frame % (SHEET_COLS * SHEET_ROWS);
    let col = frame % SHEET_COLS;
    let row = frame / SHEET_COLS;
    Mat3::model(
        Vec2::new(
            col as f32 / SHEET_COLS as f32,
            row as f32 / SHEET_ROWS as f32,
        ),
        Vec2::new(1.0 / SHEET_COLS as f32, 1.0 / SHEET_ROWS as f32),
        0.0,
    )
}

fn orbiter_tint(i: u32) -> Color {
    const PALETTE: [Color; 4] = [
        Color::rgb(1.0, 0.45, 0.35),
        Color::rgb(0.95, 0.8, 0.3),
        Color::rgb(0.4, 0.85, 0.5),
        Color::rgb(0.4, 0.6, 1.0),
    ];
    PALETTE[(i % PALETTE.len() as u32) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placements_are_orbiters_plus_focus() {
        let scene = Scene::default();
        let params = SceneParams {
            orbit_count: 5,
            ..SceneParams::default()
        };
        assert_eq!(scene.placements(&params).len(), 6);
    }

    #[test]
    fn orbit_count_is_capped() {
        let scene = Scene::default();
        let params = SceneParams {
            orbit_count: 10_000,
            ..SceneParams::default()
        };
        assert_eq!(
            scene.placements(&params).len() as u32,
            MAX_ORBITERS + 1
        );
    }

    #[test]
    fn focus_placement_honors_parameters() {
        let scene = Scene::default();
        let params = SceneParams {
            focus_position: Vec2::new(30.0, -12.0),
            focus_scale: 99.0,
            focus_rotation: 1.25,
            focus_tint: [0.5, 0.25, 0.75, 1.0],
            ..SceneParams::default()
        };

        let placements = scene.placements(&params);
        let focus = placements.last().unwrap();
        assert_eq!(focus.instance.position, Vec2::new(30.0, -12.0));
        assert_eq!(focus.instance.scale, Vec2::splat(99.0));
        assert_eq!(focus.instance.rotation, 1.25);
        assert_eq!(focus.tint, Color::rgba(0.5, 0.25, 0.75, 1.0));
    }

    #[test]
    fn advance_accumulates_and_wraps() {
        let mut scene = Scene::default();
        let params = SceneParams {
            orbit_speed: 1.0,
            ..SceneParams::default()
        };
        scene.advance(0.5, &params);
        assert!((scene.angle - 0.5).abs() < 1e-6);

        scene.advance(100.0, &params);
        assert!(scene.angle >= 0.0 && scene.angle < TAU);
    }

    #[test]
    fn sheet_cells_tile_the_unit_square() {
        // Cell 0 starts at the uv origin; each cell's window is 1/cols × 1/rows.
        let c0 = sheet_cell(0);
        let origin = c0.transform_point(Vec2::zero());
        assert_eq!(origin, Vec2::zero());
        let extent = c0.transform_point(Vec2::new(1.0, 1.0));
        assert!((extent.x - 1.0 / SHEET_COLS as f32).abs() < 1e-6);
        assert!((extent.y - 1.0 / SHEET_ROWS as f32).abs() < 1e-6);

        // The last cell ends exactly at (1, 1).
        let last = sheet_cell(SHEET_COLS * SHEET_ROWS - 1);
        let corner = last.transform_point(Vec2::new(1.0, 1.0));
        assert!((corner.x - 1.0).abs() < 1e-6 && (corner.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sheet_frames_wrap_around() {
        let cells = SHEET_COLS * SHEET_ROWS;
        assert_eq!(sheet_cell(cells), sheet_cell(0));
        assert_eq!(sheet_cell(cells + 1), sheet_cell(1));
    }

    #[test]
    fn sheet_animation_advances_with_frame_rate() {
        let mut scene = Scene::default();
        let params = SceneParams {
            frame_rate: 2.0,
            ..SceneParams::default()
        };
        assert_eq!(scene.sheet_frame(), 0);
        scene.advance(0.6, &params); // 1.2 cells in
        assert_eq!(scene.sheet_frame(), 1);

        let focus = scene.placements(&params).pop().unwrap();
        assert_eq!(focus.uv_transform, sheet_cell(1));
    }

    #[test]
    fn orbiters_sit_on_the_orbit_circle() {
        let scene = Scene::default();
        let params = SceneParams {
            orbit_count: 8,
            orbit_radius: 100.0,
            ..SceneParams::default()
        };
        for p in scene.placements(&params).iter().take(8) {
            let pos = p.instance.position;
            let r = (pos.x * pos.x + pos.y * pos.y).sqrt();
            assert!((r - 100.0).abs() < 1e-3, "radius {r}");
        }
    }
}
