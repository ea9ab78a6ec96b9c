//! Settings rows and their effects
//!
//! Each settings key maps to one effect function. Editing a row in the
//! settings catalog looks the key up here and applies the new value to
//! [`Settings`].

use crate::catalog::CatalogEntry;
use cf_core::{Font, Scaling, Settings, SystemModel};

/// Keys of the settings rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    PixelPerfect,
    SystemModel,
    Font,
}

/// Effect of a settings row: store `value` into the settings
pub type OptionEffect = fn(&mut Settings, usize);

/// Key to effect table
pub const OPTION_EFFECTS: [(OptionKey, OptionEffect); 3] = [
    (OptionKey::PixelPerfect, set_pixel_perfect),
    (OptionKey::SystemModel, set_system_model),
    (OptionKey::Font, set_font),
];

fn set_pixel_perfect(settings: &mut Settings, value: usize) {
    settings.scaling = if value != 0 {
        Scaling::PixelPerfect
    } else {
        Scaling::Aspect4x3
    };
}

fn set_system_model(settings: &mut Settings, value: usize) {
    if let Some(model) = SystemModel::ALL.get(value) {
        settings.model = *model;
        tracing::info!("CPU clock set to {} Hz", model.clock_hz());
    }
}

fn set_font(settings: &mut Settings, value: usize) {
    if let Some(font) = Font::ALL.get(value) {
        settings.font = *font;
    }
}

/// Effect registered for `key`
pub fn effect_for(key: OptionKey) -> Option<OptionEffect> {
    OPTION_EFFECTS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, effect)| *effect)
}

/// Run the effect for `key` with `value`
pub fn apply(key: OptionKey, settings: &mut Settings, value: usize) {
    match effect_for(key) {
        Some(effect) => effect(settings, value),
        None => tracing::warn!("No effect registered for {:?}", key),
    }
}

/// Rows of the settings catalog, reflecting `settings`
pub fn settings_entries(settings: &Settings) -> Vec<CatalogEntry> {
    let models: Vec<&str> = SystemModel::ALL.iter().map(|m| m.label()).collect();
    let model = SystemModel::ALL
        .iter()
        .position(|m| *m == settings.model)
        .unwrap_or(0);

    let fonts: Vec<&str> = Font::ALL.iter().map(|f| f.label()).collect();
    let font = Font::ALL.iter().position(|f| *f == settings.font).unwrap_or(0);

    vec![
        CatalogEntry::boolean(
            "Pixel Perfect",
            OptionKey::PixelPerfect,
            settings.scaling == Scaling::PixelPerfect,
        ),
        CatalogEntry::choice("System Model", OptionKey::SystemModel, &models, model),
        CatalogEntry::choice("Font", OptionKey::Font, &fonts, font),
    ]
}
