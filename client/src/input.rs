//! Mouse and keyboard input, turned into player commands.

use macroquad::prelude::*;
use shared::Vec2 as MapPoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Left click at a map position: attack what is there or walk to it.
    Click(MapPoint),
    Strike,
    Mend,
    NextMap,
    Quit,
}

/// Rising-edge detection for a single key.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyEdge {
    was_down: bool,
}

impl KeyEdge {
    /// True only on the frame the key goes down.
    pub fn pressed(&mut self, down: bool) -> bool {
        let pressed = down && !self.was_down;
        self.was_down = down;
        pressed
    }
}

#[derive(Default)]
pub struct InputManager {
    strike: KeyEdge,
    mend: KeyEdge,
    next_map: KeyEdge,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples this frame's input. `camera` is the map position drawn at the
    /// window's top-left corner.
    pub fn update(&mut self, camera: MapPoint) -> Vec<Command> {
        let mut commands = Vec::new();

        if is_mouse_button_pressed(MouseButton::Left) {
            let (x, y) = mouse_position();
            commands.push(Command::Click(screen_to_map(x, y, camera)));
        }
        if self.strike.pressed(is_key_down(KeyCode::Key1)) {
            commands.push(Command::Strike);
        }
        if self.mend.pressed(is_key_down(KeyCode::Key2)) {
            commands.push(Command::Mend);
        }
        if self.next_map.pressed(is_key_down(KeyCode::M)) {
            commands.push(Command::NextMap);
        }
        if is_key_pressed(KeyCode::Escape) {
            commands.push(Command::Quit);
        }

        commands
    }
}

pub fn screen_to_map(x: f32, y: f32, camera: MapPoint) -> MapPoint {
    MapPoint::new(x + camera.x, y + camera.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_edge_fires_once_per_press() {
        let mut edge = KeyEdge::default();
        assert!(!edge.pressed(false));
        assert!(edge.pressed(true));
        assert!(!edge.pressed(true));
        assert!(!edge.pressed(false));
        assert!(edge.pressed(true));
    }

    #[test]
    fn test_screen_to_map_adds_camera() {
        let point = screen_to_map(10.0, 20.0, MapPoint::new(100.0, 200.0));
        assert_eq!(point, MapPoint::new(110.0, 220.0));
    }
}
