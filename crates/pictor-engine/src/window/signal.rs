use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;

/// Runtime-relevant classification of a window event.
///
/// The application sees the raw `WindowEvent` first; this is what the
/// runtime itself acts on afterwards.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum WindowSignal {
    /// Drawable size changed; the surface must be reconfigured.
    Resized(PhysicalSize<u32>),
    /// DPI scale changed. The drawable size is re-read from the window
    /// since the event's size negotiation is irrelevant here.
    ScaleChanged,
    CloseRequested,
    RedrawRequested,
    /// Everything the runtime leaves to the application.
    Other,
}

pub fn classify(event: &WindowEvent) -> WindowSignal {
    match event {
        WindowEvent::CloseRequested => WindowSignal::CloseRequested,
        WindowEvent::Resized(size) => WindowSignal::Resized(*size),
        WindowEvent::ScaleFactorChanged { .. } => WindowSignal::ScaleChanged,
        WindowEvent::RedrawRequested => WindowSignal::RedrawRequested,
        _ => WindowSignal::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_events_are_classified() {
        assert_eq!(
            classify(&WindowEvent::CloseRequested),
            WindowSignal::CloseRequested
        );
        assert_eq!(
            classify(&WindowEvent::RedrawRequested),
            WindowSignal::RedrawRequested
        );
        assert_eq!(
            classify(&WindowEvent::Resized(PhysicalSize::new(800, 600))),
            WindowSignal::Resized(PhysicalSize::new(800, 600))
        );
    }

    #[test]
    fn input_events_are_left_to_the_app() {
        assert_eq!(classify(&WindowEvent::Focused(true)), WindowSignal::Other);
        assert_eq!(
            classify(&WindowEvent::HoveredFileCancelled),
            WindowSignal::Other
        );
    }
}
