//! Encoding of the root window hints the session publishes.

use strum::IntoEnumIterator;

use crate::sys::geometry::Rect;
use crate::sys::window_system::{HintKey, PropertyValue};

/// Legacy icon size hint: min 32x32, max 32x32, no increments.
const ICON_SIZE: [u32; 6] = [32, 32, 32, 32, 0, 0];

/// Atoms advertised in `_NET_SUPPORTED`.
pub fn supported() -> PropertyValue {
    let mut atoms: Vec<String> = HintKey::iter()
        .filter(|key| *key != HintKey::IconSize)
        .map(|key| key.atom_name().to_string())
        .collect();
    atoms.push("_NET_STARTUP_ID".to_string());
    PropertyValue::Atoms(atoms)
}

pub fn cardinal(value: usize) -> PropertyValue {
    PropertyValue::Cardinals(vec![u32::try_from(value).unwrap_or(u32::MAX)])
}

pub fn desktop_geometry(screen: Rect) -> PropertyValue {
    PropertyValue::Cardinals(vec![non_negative(screen.width), non_negative(screen.height)])
}

/// Viewports are not supported, so every workspace sits at the origin.
pub fn desktop_viewport() -> PropertyValue { PropertyValue::Cardinals(vec![0, 0]) }

pub fn icon_size() -> PropertyValue { PropertyValue::Cardinals(ICON_SIZE.to_vec()) }

pub fn showing_desktop(showing: bool) -> PropertyValue {
    PropertyValue::Cardinals(vec![u32::from(showing)])
}

/// Four cardinals (x, y, width, height) per workspace.
pub fn workarea(areas: impl IntoIterator<Item = Rect>) -> PropertyValue {
    PropertyValue::Cardinals(
        areas
            .into_iter()
            .flat_map(|r| {
                [non_negative(r.x), non_negative(r.y), non_negative(r.width), non_negative(r.height)]
            })
            .collect(),
    )
}

fn non_negative(value: i32) -> u32 { u32::try_from(value).unwrap_or(0) }

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn workarea_has_four_values_per_workspace() {
        let value = workarea([Rect::new(0, 24, 1920, 1056), Rect::new(0, 0, 1920, 1080)]);
        assert_eq!(
            value,
            PropertyValue::Cardinals(vec![0, 24, 1920, 1056, 0, 0, 1920, 1080])
        );
    }

    #[test]
    fn supported_lists_every_root_hint() {
        let PropertyValue::Atoms(atoms) = supported() else { panic!("expected atoms") };
        assert!(atoms.iter().any(|a| a == "_NET_WORKAREA"));
        assert!(atoms.iter().any(|a| a == "_NET_DESKTOP_LAYOUT"));
        assert!(!atoms.iter().any(|a| a == "WM_ICON_SIZE"));
    }
}
