/// Player lifecycle states.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum PlayerState {
    #[default]
    Stopped,
    Loading,
    Loaded,
    Playing,
    Paused,
    Buffering,
    Seeking,
    Ended,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Loading => "LOADING",
            Self::Loaded => "LOADED",
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
            Self::Buffering => "BUFFERING",
            Self::Seeking => "SEEKING",
            Self::Ended => "ENDED",
        }
    }

    /// States in which media is expected to advance.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Loaded | Self::Playing | Self::Paused | Self::Buffering | Self::Seeking
        )
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
