use crate::model::Element;

pub type Frame = i64;

pub fn time_to_frame(time: f64, fps: f64) -> Frame { (time * fps).round() as Frame }

pub fn frame_to_time(frame: Frame, fps: f64) -> f64 {
    if fps <= 0.0 { return 0.0; }
    frame as f64 / fps
}

/// Frame-domain view of an element's placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementFrames {
    pub start: Frame,
    pub trim_start: Frame,
    pub duration: Frame,
}

impl ElementFrames {
    pub fn of(element: &Element, fps: f64) -> Self {
        Self {
            start: time_to_frame(element.start_time, fps),
            trim_start: time_to_frame(element.trim_start, fps),
            duration: time_to_frame(element.effective_duration(), fps),
        }
    }

    pub fn end(&self) -> Frame { self.start + self.duration }

    /// First and last local frames the element can show.
    pub fn local_bounds(&self) -> (Frame, Frame) {
        (self.trim_start, self.trim_start + (self.duration - 1).max(0))
    }
}

/// Maps a main-timeline frame into the element's own clock, or `None` when
/// the element is not on screen at that frame.
pub fn global_to_local_frame(global_frame: Frame, element: &Element, fps: f64) -> Option<Frame> {
    let f = ElementFrames::of(element, fps);
    if global_frame < f.start || global_frame >= f.end() {
        return None;
    }
    Some(global_frame - f.start + f.trim_start)
}

pub fn local_to_global_frame(local_frame: Frame, element: &Element, fps: f64) -> Frame {
    let f = ElementFrames::of(element, fps);
    f.start + local_frame - f.trim_start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::element;

    #[test]
    fn time_frame_conversion() {
        assert_eq!(time_to_frame(1.0, 30.0), 30);
        assert_eq!(time_to_frame(0.016, 30.0), 0);
        assert_eq!(time_to_frame(0.017, 30.0), 1);
        assert_eq!(frame_to_time(45, 30.0), 1.5);
        assert_eq!(frame_to_time(45, 0.0), 0.0);
    }

    #[test]
    fn local_frame_scenario() {
        let e = element(2.0, 5.0);
        assert_eq!(global_to_local_frame(90, &e, 30.0), Some(30));
        assert_eq!(global_to_local_frame(30, &e, 30.0), None);
        assert_eq!(global_to_local_frame(300, &e, 30.0), None);
        assert_eq!(global_to_local_frame(60, &e, 30.0), Some(0));
        assert_eq!(global_to_local_frame(209, &e, 30.0), Some(149));
        assert_eq!(global_to_local_frame(210, &e, 30.0), None);
    }

    #[test]
    fn trim_offsets_local_clock() {
        let mut e = element(2.0, 5.0);
        e.trim_start = 1.0;
        assert_eq!(global_to_local_frame(60, &e, 30.0), Some(30));
        assert_eq!(local_to_global_frame(30, &e, 30.0), 60);
        assert_eq!(ElementFrames::of(&e, 30.0).local_bounds(), (30, 149));
    }
}
