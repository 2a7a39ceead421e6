//! Button colours: the panel's red means "live", green means "safe to be seen".

use control_core::{config::LampColor, presentation::ColorClass};
use eframe::egui::{self, Color32};

pub const LIVE_RED: Color32 = Color32::from_rgb(200, 40, 40);
pub const SAFE_GREEN: Color32 = Color32::from_rgb(40, 150, 70);
pub const LAMP_YELLOW: Color32 = Color32::from_rgb(220, 190, 30);
pub const LAMP_CYAN: Color32 = Color32::from_rgb(30, 190, 210);
pub const DIM_TEXT: Color32 = Color32::from_rgb(150, 150, 150);

/// Fill for a presented entity; `None` keeps the theme's default button fill.
pub fn fill_for(color: ColorClass) -> Option<Color32> {
    match color {
        ColorClass::Neutral => None,
        ColorClass::Active => Some(LIVE_RED),
        ColorClass::Safe => Some(SAFE_GREEN),
    }
}

pub fn lamp_fill(color: LampColor, on: bool) -> Option<Color32> {
    if !on {
        return None;
    }
    Some(match color {
        LampColor::Red => LIVE_RED,
        LampColor::Yellow => LAMP_YELLOW,
        LampColor::Cyan => LAMP_CYAN,
    })
}

/// Dark text on the light lamp colours, white everywhere else.
pub fn text_on(fill: Color32) -> Color32 {
    let luma = 0.299 * f32::from(fill.r()) + 0.587 * f32::from(fill.g()) + 0.114 * f32::from(fill.b());
    if luma > 150.0 {
        Color32::BLACK
    } else {
        Color32::WHITE
    }
}

pub fn visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();
    visuals.selection.bg_fill = LIVE_RED.gamma_multiply(0.8);
    visuals.widgets.hovered.weak_bg_fill = egui::Color32::from_rgb(70, 72, 78);
    visuals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lamps_light_only_when_on() {
        assert_eq!(lamp_fill(LampColor::Cyan, false), None);
        assert_eq!(lamp_fill(LampColor::Cyan, true), Some(LAMP_CYAN));
        assert_eq!(fill_for(ColorClass::Neutral), None);
        assert_eq!(fill_for(ColorClass::Safe), Some(SAFE_GREEN));
    }

    #[test]
    fn label_text_stays_readable() {
        assert_eq!(text_on(LAMP_YELLOW), Color32::BLACK);
        assert_eq!(text_on(LIVE_RED), Color32::WHITE);
    }
}
