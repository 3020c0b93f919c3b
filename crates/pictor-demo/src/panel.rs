//! The parameter panel. Widgets write straight into `SceneParams`; the
//! scene reads the values on the next frame.

use std::f32::consts::TAU;

use crate::scene::{MAX_ORBITERS, SceneParams};

pub fn draw(ctx: &egui::Context, params: &mut SceneParams) {
    egui::Window::new("scene")
        .default_width(260.0)
        .show(ctx, |ui| {
            ui.heading("focus sprite");
            ui.horizontal(|ui| {
                ui.label("position");
                ui.add(egui::DragValue::new(&mut params.focus_position.x).speed(1.0));
                ui.add(egui::DragValue::new(&mut params.focus_position.y).speed(1.0));
            });
            ui.add(egui::Slider::new(&mut params.focus_scale, 8.0..=512.0).text("size"));
            ui.add(egui::Slider::new(&mut params.focus_rotation, 0.0..=TAU).text("rotation"));
            ui.horizontal(|ui| {
                ui.label("tint");
                ui.color_edit_button_rgba_unmultiplied(&mut params.focus_tint);
            });

            ui.separator();
            ui.heading("orbiters");
            ui.add(egui::Slider::new(&mut params.orbit_count, 0..=MAX_ORBITERS).text("count"));
            ui.add(egui::Slider::new(&mut params.orbit_speed, -4.0..=4.0).text("speed"));
            ui.add(egui::Slider::new(&mut params.orbit_radius, 32.0..=512.0).text("radius"));

            ui.separator();
            ui.heading("animation");
            ui.add(egui::Slider::new(&mut params.frame_rate, 0.0..=30.0).text("frames/s"));

            ui.separator();
            if ui.button("reset").clicked() {
                *params = SceneParams::default();
            }
        });
}
