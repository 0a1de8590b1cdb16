use serde::{Deserialize, Serialize};

use crate::actor::screen::display_topology::HotCorners;
use crate::sys::geometry::Rect;

/// Notifications for the shell around the window manager: pagers, panels and
/// anything listening on `--print-events`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum BroadcastEvent {
    WorkspaceAdded {
        index: usize,
    },
    WorkspaceRemoved {
        index: usize,
    },
    WorkspaceReordered {
        from: usize,
        to: usize,
    },
    WorkspaceActivated {
        index: usize,
    },
    WorkspaceNamesChanged {
        names: Vec<String>,
    },
    ShowingDesktopChanged {
        showing: bool,
    },
    StartupFeedback {
        busy: bool,
        launching: Vec<String>,
    },
    HotCornersMoved {
        corners: HotCorners,
    },
    MonitorsChanged {
        monitors: Vec<Rect>,
    },
    TilePreviewRequested,
}

pub type BroadcastSender = crate::actor::Sender<BroadcastEvent>;
pub type BroadcastReceiver = crate::actor::Receiver<BroadcastEvent>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn events_are_tagged_json() {
        let json = serde_json::to_string(&BroadcastEvent::WorkspaceReordered { from: 0, to: 2 })
            .unwrap();
        assert_eq!(json, r#"{"type":"workspace_reordered","from":0,"to":2}"#);

        let json = serde_json::to_string(&BroadcastEvent::TilePreviewRequested).unwrap();
        assert_eq!(json, r#"{"type":"tile_preview_requested"}"#);

        let parsed: BroadcastEvent =
            serde_json::from_str(r#"{"type":"showing_desktop_changed","showing":true}"#).unwrap();
        assert_eq!(parsed, BroadcastEvent::ShowingDesktopChanged { showing: true });
    }
}
