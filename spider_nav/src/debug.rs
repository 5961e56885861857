// Debug drawing through an injected sink.
//
// Components that want to visualize what they are doing (the offline
// builder's tracers, hits, and edges; the navigator's loaded relations)
// take a `&dyn DebugSink` and emit draw commands into it. The host decides
// what to do with them: forward to an engine's line renderer, record them
// for a test, or drop them. There is no process-wide queue.
//
// Sinks must be `Sync`: the builder emits from its parallel stages.

use glam::Vec3;
use parking_lot::Mutex;

/// RGBA color, 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8, pub u8);

impl Color {
    pub const RED: Color = Color(255, 0, 0, 255);
    pub const GREEN: Color = Color(0, 255, 0, 255);
    pub const BLUE: Color = Color(0, 0, 255, 255);
    pub const YELLOW: Color = Color(255, 255, 0, 255);
    pub const CYAN: Color = Color(0, 255, 255, 255);
    pub const MAGENTA: Color = Color(255, 0, 255, 255);
}

/// One draw command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DebugDraw {
    Line {
        start: Vec3,
        end: Vec3,
        color: Color,
        lifetime: f32,
    },
    Sphere {
        center: Vec3,
        radius: f32,
        color: Color,
        lifetime: f32,
    },
    Point {
        position: Vec3,
        size: f32,
        color: Color,
        lifetime: f32,
    },
}

/// Receiver for debug draw commands.
pub trait DebugSink: Send + Sync {
    fn draw(&self, command: DebugDraw);

    fn line(&self, start: Vec3, end: Vec3, color: Color, lifetime: f32) {
        self.draw(DebugDraw::Line {
            start,
            end,
            color,
            lifetime,
        });
    }

    fn sphere(&self, center: Vec3, radius: f32, color: Color, lifetime: f32) {
        self.draw(DebugDraw::Sphere {
            center,
            radius,
            color,
            lifetime,
        });
    }

    fn point(&self, position: Vec3, size: f32, color: Color, lifetime: f32) {
        self.draw(DebugDraw::Point {
            position,
            size,
            color,
            lifetime,
        });
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DebugSink for NullSink {
    fn draw(&self, _command: DebugDraw) {}
}

/// Buffers commands until the host drains them (e.g. once per frame).
#[derive(Debug, Default)]
pub struct RecordingSink {
    pending: Mutex<Vec<DebugDraw>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every buffered command, oldest first.
    pub fn drain(&self) -> Vec<DebugDraw> {
        std::mem::take(&mut *self.pending.lock())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl DebugSink for RecordingSink {
    fn draw(&self, command: DebugDraw) {
        self.pending.lock().push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_drains_in_order() {
        let sink = RecordingSink::new();
        sink.point(Vec3::ZERO, 2.0, Color::YELLOW, 0.25);
        sink.line(Vec3::ZERO, Vec3::X, Color::BLUE, 1.0);
        assert_eq!(sink.len(), 2);

        let drained = sink.drain();
        assert!(matches!(drained[0], DebugDraw::Point { .. }));
        assert!(matches!(drained[1], DebugDraw::Line { .. }));
        assert!(sink.is_empty());
    }

    #[test]
    fn null_sink_accepts_anything() {
        let sink: &dyn DebugSink = &NullSink;
        sink.sphere(Vec3::ONE, 6.0, Color::GREEN, 0.75);
    }
}
