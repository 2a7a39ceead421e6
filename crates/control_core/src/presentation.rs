use async_trait::async_trait;
use shared::domain::EntityKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorClass {
    Neutral,
    Active,
    /// Active scene that is fine to show during a break.
    Safe,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresentedValue {
    Flag(bool),
    Level(f64),
    Text(String),
}

/// What the View renders for one control. Read-only; the View never writes entity state.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub key: EntityKey,
    pub value: PresentedValue,
    pub text: String,
    pub color: ColorClass,
}

#[async_trait]
pub trait Presentable: Send + Sync {
    fn key(&self) -> &EntityKey;

    /// Current presentation. Entities that drive several widgets (the scene selector) return
    /// one entry per widget.
    async fn presentations(&self) -> Vec<Presentation>;
}
