use serde::Serialize;

/// Interaction events published by the page controller for a presentation
/// component (tooltip, panel) to consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PageEvent {
    #[serde(rename_all = "camelCase")]
    TooltipShow {
        original: String,
        translation: String,
        x: f64,
        y: f64,
    },
    TooltipHide,
    #[serde(rename_all = "camelCase")]
    WordActivated {
        original: String,
        translation: String,
        example: String,
    },
}
