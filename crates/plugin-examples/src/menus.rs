//! Timeline menu entries.

use aviutl2::prelude::*;

use crate::SolidClipToolkit;

/// Effect name used in the aliases this plugin creates.
pub const EFFECT: &str = "Solid clip";

/// Alias text of a solid clip object.
pub fn clip_alias(color: [u8; 3]) -> String {
    let [r, g, b] = color;
    format!("[Object]\n[Object.0]\neffect.name={EFFECT}\ncolor={r:02x}{g:02x}{b:02x}\n")
}

/// Layer menu: insert a clip at the cursor on the first free layer.
pub fn insert_clip(section: &mut EditSection<'_>) -> AnyResult<()> {
    let (length, color) = aviutl2::host::with_instance::<SolidClipToolkit, _>(|plugin| {
        plugin.settings.inserted += 1;
        (plugin.settings.clip_length, plugin.settings.color)
    })?;
    let info = section.info();
    let layer = usize::try_from(info.layer_max.saturating_add(1))?;
    let frame = usize::try_from(info.frame.max(0))?;
    let object = section.create_object_from_alias(&clip_alias(color), layer, frame, length)?;
    section.set_focus_object(object);
    tracing::info!(layer, frame, length, "solid clip inserted");
    Ok(())
}

/// Object menu: move every selected object down one layer.
pub fn push_down(section: &mut EditSection<'_>) -> AnyResult<()> {
    let mut selected = section.selected_objects();
    if selected.is_empty() {
        selected.extend(section.focus_object());
    }
    // Deepest layer first so a moved object never lands on one still to move.
    selected.sort_by_key(|o| std::cmp::Reverse(section.object_layer_frame(*o).layer));
    for object in selected {
        let position = section.object_layer_frame(object);
        let layer = usize::try_from(position.layer.saturating_add(1))?;
        let frame = usize::try_from(position.start)?;
        section.move_object(object, layer, frame)?;
    }
    Ok(())
}
