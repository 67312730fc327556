use crate::markup::model::{Color, Markup, Point, Shape};
use crate::markup::store::AnnotationStore;
use crate::markup::surface_map::SurfaceMapper;
use crate::markup::tools::{Tool, ToolState};
use serde::{Deserialize, Serialize};

/// What happens to gestures that end without visible extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Commit them as point markers.
    #[default]
    Keep,
    Discard,
}

/// Text anchor waiting for the host's text-entry control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingText {
    pub anchor: Point,
    pub color: Color,
    pub stroke_width: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Drawing(Markup),
    AwaitingTextInput(PendingText),
}

/// Minimal repaint the host has to perform after an input event.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderRequest {
    Nothing,
    /// Stroke one new freehand segment on top of what is already shown.
    Segment {
        from: Point,
        to: Point,
        color: Color,
        stroke_width: u32,
    },
    /// Full redraw of the committed annotations plus this rubber-band shape.
    Preview(Markup),
    Full,
}

/// Pointer and text-entry state machine.
///
/// The tool and style are captured at pointer-down, so tool changes during
/// a drag only apply to the next gesture.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DrawingEngine {
    state: EngineState,
    policy: DegeneratePolicy,
}

impl DrawingEngine {
    pub fn new(policy: DegeneratePolicy) -> Self {
        Self {
            state: EngineState::Idle,
            policy,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn policy(&self) -> DegeneratePolicy {
        self.policy
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, EngineState::Idle)
    }

    /// The in-progress gesture, if any.
    pub fn preview(&self) -> Option<&Markup> {
        match &self.state {
            EngineState::Drawing(markup) => Some(markup),
            _ => None,
        }
    }

    pub fn pending_text(&self) -> Option<&PendingText> {
        match &self.state {
            EngineState::AwaitingTextInput(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn pointer_down(
        &mut self,
        display_x: f64,
        display_y: f64,
        tools: &ToolState,
        mapper: &SurfaceMapper,
        store: &mut AnnotationStore,
    ) -> RenderRequest {
        // A missed pointer-up still commits the earlier gesture; an open
        // text box loses focus.
        let mut request = match std::mem::take(&mut self.state) {
            EngineState::Drawing(markup) => self.finish(markup, store),
            EngineState::AwaitingTextInput(_) => {
                tracing::debug!("pending text discarded by click");
                RenderRequest::Nothing
            }
            EngineState::Idle => RenderRequest::Nothing,
        };

        let anchor = mapper.map_to_native(display_x, display_y);
        let shape = match tools.tool {
            Tool::Freehand => Shape::Freehand {
                points: vec![anchor],
            },
            Tool::Line => Shape::Line {
                start: anchor,
                end: anchor,
            },
            Tool::Arrow => Shape::Arrow {
                start: anchor,
                end: anchor,
            },
            Tool::Circle => Shape::Circle {
                center: anchor,
                edge: anchor,
            },
            Tool::Rectangle => Shape::Rectangle {
                corner1: anchor,
                corner2: anchor,
            },
            Tool::Text => {
                self.state = EngineState::AwaitingTextInput(PendingText {
                    anchor,
                    color: tools.color,
                    stroke_width: tools.stroke_width,
                });
                return request;
            }
            Tool::Eraser => return request,
        };

        let markup = Markup {
            shape,
            color: tools.color,
            stroke_width: tools.stroke_width,
        };
        if !matches!(markup.shape, Shape::Freehand { .. }) {
            request = RenderRequest::Preview(markup.clone());
        }
        self.state = EngineState::Drawing(markup);
        request
    }

    pub fn pointer_move(
        &mut self,
        display_x: f64,
        display_y: f64,
        mapper: &SurfaceMapper,
    ) -> RenderRequest {
        let EngineState::Drawing(markup) = &mut self.state else {
            return RenderRequest::Nothing;
        };
        let point = mapper.map_to_native(display_x, display_y);
        match &mut markup.shape {
            Shape::Freehand { points } => {
                let Some(&last) = points.last() else {
                    points.push(point);
                    return RenderRequest::Nothing;
                };
                if last == point {
                    return RenderRequest::Nothing;
                }
                points.push(point);
                RenderRequest::Segment {
                    from: last,
                    to: point,
                    color: markup.color,
                    stroke_width: markup.stroke_width,
                }
            }
            Shape::Line { end, .. } | Shape::Arrow { end, .. } => {
                *end = point;
                RenderRequest::Preview(markup.clone())
            }
            Shape::Circle { edge, .. } => {
                *edge = point;
                RenderRequest::Preview(markup.clone())
            }
            Shape::Rectangle { corner2, .. } => {
                *corner2 = point;
                RenderRequest::Preview(markup.clone())
            }
            Shape::Text { .. } => RenderRequest::Nothing,
        }
    }

    pub fn pointer_up(
        &mut self,
        display_x: f64,
        display_y: f64,
        mapper: &SurfaceMapper,
        store: &mut AnnotationStore,
    ) -> RenderRequest {
        if !matches!(self.state, EngineState::Drawing(_)) {
            return RenderRequest::Nothing;
        }
        self.pointer_move(display_x, display_y, mapper);
        match std::mem::take(&mut self.state) {
            EngineState::Drawing(markup) => self.finish(markup, store),
            other => {
                self.state = other;
                RenderRequest::Nothing
            }
        }
    }

    /// Confirm the pending text. Blank text is dropped without a trace.
    pub fn commit_text(&mut self, text: &str, store: &mut AnnotationStore) -> RenderRequest {
        let EngineState::AwaitingTextInput(pending) = self.state else {
            return RenderRequest::Nothing;
        };
        self.state = EngineState::Idle;

        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("empty text discarded");
            return RenderRequest::Nothing;
        }
        let annotation = store.commit(Markup {
            shape: Shape::Text {
                anchor: pending.anchor,
                text: text.to_string(),
            },
            color: pending.color,
            stroke_width: pending.stroke_width,
        });
        tracing::debug!(id = annotation.id.0, "text annotation committed");
        RenderRequest::Full
    }

    pub fn cancel_text(&mut self) {
        if matches!(self.state, EngineState::AwaitingTextInput(_)) {
            self.state = EngineState::Idle;
        }
    }

    /// Drop whatever is in progress without touching the store.
    pub fn cancel(&mut self) -> RenderRequest {
        match std::mem::take(&mut self.state) {
            EngineState::Drawing(_) => RenderRequest::Full,
            EngineState::AwaitingTextInput(_) | EngineState::Idle => RenderRequest::Nothing,
        }
    }

    fn finish(&self, mut markup: Markup, store: &mut AnnotationStore) -> RenderRequest {
        if let Shape::Freehand { points } = &mut markup.shape {
            if points.len() == 1 {
                let only = points[0];
                points.push(only);
            }
        }

        if self.policy == DegeneratePolicy::Discard && markup.shape.is_degenerate() {
            tracing::debug!(kind = markup.shape.kind().as_str(), "degenerate gesture discarded");
            return RenderRequest::Full;
        }

        let annotation = store.commit(markup);
        tracing::debug!(
            id = annotation.id.0,
            kind = annotation.kind().as_str(),
            "annotation committed"
        );
        RenderRequest::Full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::model::PixelSize;

    fn mapper() -> SurfaceMapper {
        SurfaceMapper::new(
            PixelSize {
                width: 200,
                height: 200,
            },
            200.0,
            200.0,
        )
        .expect("mapper")
    }

    fn tools(tool: Tool) -> ToolState {
        ToolState {
            tool,
            color: Color::RED,
            stroke_width: 3,
        }
    }

    #[test]
    fn rectangle_drag_commits_on_pointer_up() {
        let mapper = mapper();
        let mut store = AnnotationStore::default();
        let mut engine = DrawingEngine::default();

        engine.pointer_down(10.0, 10.0, &tools(Tool::Rectangle), &mapper, &mut store);
        let request = engine.pointer_move(60.0, 30.0, &mapper);
        assert!(matches!(request, RenderRequest::Preview(_)));
        assert!(store.is_empty());

        assert_eq!(
            engine.pointer_up(110.0, 60.0, &mapper, &mut store),
            RenderRequest::Full
        );
        assert!(engine.is_idle());
        assert_eq!(
            store.annotations()[0].markup.shape,
            Shape::Rectangle {
                corner1: Point::new(10.0, 10.0),
                corner2: Point::new(110.0, 60.0),
            }
        );
    }

    #[test]
    fn freehand_moves_emit_incremental_segments() {
        let mapper = mapper();
        let mut store = AnnotationStore::default();
        let mut engine = DrawingEngine::default();

        let down = engine.pointer_down(0.0, 0.0, &tools(Tool::Freehand), &mapper, &mut store);
        assert_eq!(down, RenderRequest::Nothing);
        assert_eq!(
            engine.pointer_move(5.0, 5.0, &mapper),
            RenderRequest::Segment {
                from: Point::new(0.0, 0.0),
                to: Point::new(5.0, 5.0),
                color: Color::RED,
                stroke_width: 3,
            }
        );
        assert_eq!(engine.pointer_move(5.0, 5.0, &mapper), RenderRequest::Nothing);
        engine.pointer_up(10.0, 3.0, &mapper, &mut store);

        assert_eq!(
            store.annotations()[0].markup.shape.points(),
            vec![
                Point::new(0.0, 0.0),
                Point::new(5.0, 5.0),
                Point::new(10.0, 3.0)
            ]
        );
    }

    #[test]
    fn tool_change_mid_drag_is_ignored() {
        let mapper = mapper();
        let mut store = AnnotationStore::default();
        let mut engine = DrawingEngine::default();
        let mut state = tools(Tool::Line);

        engine.pointer_down(0.0, 0.0, &state, &mapper, &mut store);
        state.tool = Tool::Circle;
        engine.pointer_move(20.0, 0.0, &mapper);
        engine.pointer_up(40.0, 0.0, &mapper, &mut store);

        assert!(matches!(
            store.annotations()[0].markup.shape,
            Shape::Line { .. }
        ));
    }

    #[test]
    fn text_click_waits_for_confirmation() {
        let mapper = mapper();
        let mut store = AnnotationStore::default();
        let mut engine = DrawingEngine::default();

        engine.pointer_down(30.0, 40.0, &tools(Tool::Text), &mapper, &mut store);
        assert_eq!(
            engine.pending_text().map(|p| p.anchor),
            Some(Point::new(30.0, 40.0))
        );
        assert_eq!(engine.commit_text("  ", &mut store), RenderRequest::Nothing);
        assert!(store.is_empty());
        assert!(engine.is_idle());

        engine.pointer_down(30.0, 40.0, &tools(Tool::Text), &mapper, &mut store);
        assert_eq!(engine.commit_text("Elbow in", &mut store), RenderRequest::Full);
        assert_eq!(store.annotations()[0].markup.shape.text(), Some("Elbow in"));
    }

    #[test]
    fn clicking_elsewhere_discards_pending_text() {
        let mapper = mapper();
        let mut store = AnnotationStore::default();
        let mut engine = DrawingEngine::default();

        engine.pointer_down(30.0, 40.0, &tools(Tool::Text), &mapper, &mut store);
        engine.pointer_down(50.0, 50.0, &tools(Tool::Line), &mapper, &mut store);
        assert!(engine.pending_text().is_none());
        assert!(engine.preview().is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn cancel_drops_preview_without_committing() {
        let mapper = mapper();
        let mut store = AnnotationStore::default();
        let mut engine = DrawingEngine::default();

        engine.pointer_down(0.0, 0.0, &tools(Tool::Arrow), &mapper, &mut store);
        engine.pointer_move(50.0, 50.0, &mapper);
        assert_eq!(engine.cancel(), RenderRequest::Full);
        assert_eq!(
            engine.pointer_up(50.0, 50.0, &mapper, &mut store),
            RenderRequest::Nothing
        );
        assert!(store.is_empty());
    }

    #[test]
    fn eraser_is_inert() {
        let mapper = mapper();
        let mut store = AnnotationStore::default();
        let mut engine = DrawingEngine::default();

        engine.pointer_down(0.0, 0.0, &tools(Tool::Eraser), &mapper, &mut store);
        engine.pointer_up(20.0, 20.0, &mapper, &mut store);
        assert!(engine.is_idle());
        assert!(store.is_empty());
    }

    #[test]
    fn degenerate_policy_keeps_or_discards_point_markers() {
        let mapper = mapper();
        for (policy, expected) in [(DegeneratePolicy::Keep, 1), (DegeneratePolicy::Discard, 0)] {
            let mut store = AnnotationStore::default();
            let mut engine = DrawingEngine::new(policy);
            engine.pointer_down(9.0, 9.0, &tools(Tool::Circle), &mapper, &mut store);
            engine.pointer_up(9.0, 9.0, &mapper, &mut store);
            assert_eq!(store.len(), expected, "{policy:?}");
        }
    }

    #[test]
    fn single_click_freehand_becomes_two_point_marker() {
        let mapper = mapper();
        let mut store = AnnotationStore::default();
        let mut engine = DrawingEngine::default();

        engine.pointer_down(4.0, 4.0, &tools(Tool::Freehand), &mapper, &mut store);
        engine.pointer_up(4.0, 4.0, &mapper, &mut store);
        assert_eq!(
            store.annotations()[0].markup.shape.points(),
            vec![Point::new(4.0, 4.0), Point::new(4.0, 4.0)]
        );
    }

    #[test]
    fn missed_pointer_up_commits_previous_gesture() {
        let mapper = mapper();
        let mut store = AnnotationStore::default();
        let mut engine = DrawingEngine::default();

        engine.pointer_down(0.0, 0.0, &tools(Tool::Line), &mapper, &mut store);
        engine.pointer_move(30.0, 0.0, &mapper);
        engine.pointer_down(60.0, 60.0, &tools(Tool::Line), &mapper, &mut store);
        assert_eq!(store.len(), 1);
        assert!(engine.preview().is_some());
    }
}
