use caret_dom::DomError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("position is outside any editable host")]
    OutsideHost,

    #[error("no cursor or selection available")]
    NothingSelected,

    #[error("no saved cursor state to restore")]
    NoSavedState,
}

pub type EditorResult<T> = Result<T, EditorError>;
