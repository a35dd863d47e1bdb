use crate::game::ClientGameState;
use macroquad::prelude::*;
use shared::Vec2 as MapPoint;

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    /// Map position drawn at the window's top-left corner, keeping `focus`
    /// centered unless that would show past the map edge.
    pub fn camera(&self, focus: MapPoint, map_width: f32, map_height: f32) -> MapPoint {
        let max_x = (map_width - self.width).max(0.0);
        let max_y = (map_height - self.height).max(0.0);
        MapPoint::new(
            (focus.x - self.width / 2.0).clamp(0.0, max_x),
            (focus.y - self.height / 2.0).clamp(0.0, max_y),
        )
    }

    pub fn render(&self, game: &ClientGameState, camera: MapPoint, now: u64) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        let Some(map) = game.map() else {
            draw_text("Connecting...", 10.0, 20.0, 20.0, WHITE);
            return;
        };

        draw_rectangle(
            -camera.x,
            -camera.y,
            map.width,
            map.height,
            Color::from_rgba(40, 60, 40, 255),
        );

        for obstacle in &map.obstacles {
            let (x, y) = to_screen(obstacle.center, camera);
            draw_circle(x, y, obstacle.radius, Color::from_rgba(90, 90, 90, 255));
        }

        for monster in game.remote().monsters() {
            let view = &monster.view;
            let (x, y) = to_screen(view.position, camera);
            if view.alive {
                let color = if game.target() == Some(view.id) {
                    ORANGE
                } else {
                    Color::from_rgba(200, 60, 60, 255)
                };
                draw_circle(x, y, view.radius, color);
                self.draw_bar(x, y - view.radius - 8.0, view.hp, view.max_hp, RED);
            } else {
                draw_circle_lines(x, y, view.radius, 1.0, DARKGRAY);
            }
        }

        for character in game.remote().characters() {
            let (x, y) = to_screen(character.position_at(now), camera);
            let color = if character.view.alive {
                Color::from_rgba(0, 170, 255, 255)
            } else {
                GRAY
            };
            draw_circle(x, y, shared::CHARACTER_RADIUS, color);
            draw_text(&character.view.name, x - 20.0, y - 26.0, 14.0, WHITE);
        }

        if let Some(own) = game.character() {
            let (x, y) = to_screen(game.own_position(), camera);
            let color = if own.alive { GREEN } else { GRAY };
            draw_circle(x, y, shared::CHARACTER_RADIUS, color);
            draw_circle_lines(x, y, shared::CHARACTER_RADIUS, 2.0, WHITE);
        }

        self.draw_ui(game);
    }

    fn draw_bar(&self, x: f32, y: f32, value: u32, max: u32, color: Color) {
        let width = 40.0;
        let fill = if max == 0 {
            0.0
        } else {
            width * value.min(max) as f32 / max as f32
        };
        draw_rectangle(x - width / 2.0, y, width, 4.0, Color::from_rgba(51, 51, 51, 255));
        draw_rectangle(x - width / 2.0, y, fill, 4.0, color);
    }

    fn draw_ui(&self, game: &ClientGameState) {
        let Some(own) = game.character() else {
            return;
        };

        let status = format!(
            "{} Lv{}  HP {}/{}  MP {}/{}  EXP {}/{}  Gold {}",
            own.name,
            own.level,
            own.hp,
            own.max_hp,
            own.mp,
            own.max_mp,
            own.experience,
            own.experience_to_level,
            own.gold
        );
        draw_rectangle(0.0, 0.0, self.width, 24.0, Color::from_rgba(0, 0, 0, 180));
        draw_text(&status, 10.0, 17.0, 18.0, WHITE);

        let mut y = self.height - 10.0;
        for line in game.log_lines().collect::<Vec<_>>().into_iter().rev() {
            draw_text(line, 10.0, y, 14.0, LIGHTGRAY);
            y -= 16.0;
        }
    }
}

fn to_screen(point: MapPoint, camera: MapPoint) -> (f32, f32) {
    (point.x - camera.x, point.y - camera.y)
}
