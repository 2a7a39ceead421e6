use shared::protocol::SceneItemTransform;

/// How many people share the gallery capture the PIP is cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudienceBand {
    None,
    One,
    Two,
    ThreeToFour,
    FiveToSix,
}

impl AudienceBand {
    pub const ALL: [AudienceBand; 5] = [
        AudienceBand::None,
        AudienceBand::One,
        AudienceBand::Two,
        AudienceBand::ThreeToFour,
        AudienceBand::FiveToSix,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AudienceBand::None => "None",
            AudienceBand::One => "n=1",
            AudienceBand::Two => "n=2",
            AudienceBand::ThreeToFour => "n=3-4",
            AudienceBand::FiveToSix => "n=5-6",
        }
    }
}

/// Crop in the host's source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropInset {
    pub top: i64,
    pub bottom: i64,
    pub left: i64,
    pub right: i64,
}

impl CropInset {
    /// Overwrites the four crop fields and nothing else.
    pub fn apply_to(self, transform: &mut SceneItemTransform) {
        transform.crop_top = self.top;
        transform.crop_bottom = self.bottom;
        transform.crop_left = self.left;
        transform.crop_right = self.right;
    }
}

pub fn inset_for(band: AudienceBand) -> CropInset {
    let (top, bottom, left, right) = match band {
        AudienceBand::None => (0, 0, 0, 0),
        AudienceBand::One => (0, 0, 59, 59),
        AudienceBand::Two => (90, 0, 12, 12),
        AudienceBand::ThreeToFour => (4, 0, 60, 60),
        AudienceBand::FiveToSix => (50, 0, 11, 11),
    };
    CropInset {
        top,
        bottom,
        left,
        right,
    }
}
