use thiserror::Error;

use crate::sys::window_system::SysError;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(
        "selection {selection} is already owned by another manager; use --replace to take over"
    )]
    AlreadyOwned { selection: String },
    #[error("another client took selection {selection} while we were acquiring it")]
    RaceLost { selection: String },
    #[error(transparent)]
    System(#[from] SysError),
}

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("screen {screen} on display {display} is already managed by another window manager")]
    AlreadyManaged { display: String, screen: usize },
    #[error("screen {0} does not exist")]
    InvalidScreen(usize),
    #[error(transparent)]
    System(#[from] SysError),
}
