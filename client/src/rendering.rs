use crate::coords::{CoordinateMapper, PixelPos};
use crate::effects::{Effect, EffectKind};
use crate::registry::{StatusTint, Tank};
use crate::scheduler::Millis;
use crate::session::{Phase, Session};
use macroquad::prelude::*;
use shared::{BonusType, TileCode};

pub fn tile_color(code: TileCode) -> Option<Color> {
    match code {
        TileCode::Empty => None,
        TileCode::Brick => Some(Color::from_rgba(160, 82, 45, 255)),
        TileCode::Stone => Some(Color::from_rgba(150, 150, 150, 255)),
        TileCode::Bush => Some(Color::from_rgba(34, 120, 34, 200)),
        TileCode::Water => Some(Color::from_rgba(30, 90, 200, 255)),
        TileCode::Ice => Some(Color::from_rgba(200, 230, 255, 255)),
    }
}

pub fn tint_color(tint: StatusTint) -> Color {
    match tint {
        StatusTint::Yellow => YELLOW,
        StatusTint::Blue => SKYBLUE,
        StatusTint::Purple => PURPLE,
        StatusTint::Green => GREEN,
    }
}

fn bonus_label(bonus: BonusType) -> &'static str {
    match bonus {
        BonusType::Helmet => "H",
        BonusType::Boat => "B",
        BonusType::Gun => "G",
        BonusType::Grenade => "X",
        BonusType::Star => "S",
        BonusType::Shovel => "V",
        BonusType::Clock => "C",
        BonusType::Tank => "T",
    }
}

/// The base turns to rubble once the server reports it destroyed.
fn base_color(phase: Phase) -> Color {
    match phase {
        Phase::BaseDestroyed => Color::from_rgba(90, 60, 40, 255),
        _ => Color::from_rgba(230, 200, 60, 255),
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::AwaitingStart => "waiting for start",
        Phase::Playing => "playing",
        Phase::BaseDestroyed => "base destroyed",
        Phase::Closed => "disconnected",
    }
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: f32, height: f32) -> Self {
        Renderer { width, height }
    }

    pub fn render(&mut self, session: &Session, drag_origin: Option<(f32, f32)>, now: Millis) {
        clear_background(Color::from_rgba(20, 20, 20, 255));

        let reconciler = session.reconciler();
        let mapper = *reconciler.mapper();
        let size = mapper.tile_size() as f32;

        if let Some(grid) = reconciler.grid() {
            draw_rectangle(
                mapper.offset().0,
                mapper.offset().1,
                grid.cols() as f32 * size,
                grid.rows() as f32 * size,
                BLACK,
            );
            for (x, y, cell) in grid.cells() {
                if let Some(color) = tile_color(cell.code) {
                    let corner = mapper.to_pixel(x, y);
                    draw_rectangle(corner.x, corner.y, size, size, color);
                }
            }
        }

        if let Some(base) = reconciler.base() {
            let corner = mapper.to_pixel(base.x, base.y);
            draw_rectangle(corner.x, corner.y, size, size, base_color(session.phase()));
            draw_rectangle_lines(corner.x, corner.y, size, size, 2.0, DARKGRAY);
        }

        let registry = reconciler.registry();
        for bonus in registry.bonuses.values() {
            self.draw_bonus(bonus.pixel, bonus.bonus_type, size);
        }
        for tank in registry.enemies.values() {
            self.draw_tank(tank, size, Color::from_rgba(200, 200, 200, 255));
        }
        for tank in registry.players.values() {
            let body = if tank.local { GOLD } else { Color::from_rgba(0, 170, 255, 255) };
            self.draw_tank(tank, size, body);
        }
        for bullet in registry.bullets.values() {
            let center = mapper.tile_center(bullet.tile.x, bullet.tile.y);
            draw_circle(center.x, center.y, (size / 8.0).max(2.0), WHITE);
        }

        let duration = reconciler.timings().effect_duration;
        for effect in reconciler.effects().iter() {
            self.draw_effect(effect, &mapper, now, duration);
        }

        if let Some(origin) = drag_origin {
            draw_circle_lines(origin.0, origin.1, crate::input::STICK_RADIUS, 2.0, LIGHTGRAY);
        }

        self.draw_hud(session);

        if let Some(notice) = session.notice() {
            self.draw_notice(&notice.message);
        }
    }

    fn draw_tank(&mut self, tank: &Tank, size: f32, body: Color) {
        let inset = size * 0.1;
        let x = tank.pixel.x + inset;
        let y = tank.pixel.y + inset;
        let side = size - inset * 2.0;

        draw_rectangle(x, y, side, side, body);
        if let Some(tint) = tank.tint {
            draw_rectangle_lines(x, y, side, side, 3.0, tint_color(tint));
        }

        let cx = tank.pixel.x + size / 2.0;
        let cy = tank.pixel.y + size / 2.0;
        let (dx, dy) = tank.facing.delta();
        let reach = size / 2.0;
        draw_line(cx, cy, cx + dx as f32 * reach, cy + dy as f32 * reach, size / 6.0, DARKGRAY);
    }

    fn draw_bonus(&mut self, pixel: PixelPos, bonus: BonusType, size: f32) {
        draw_rectangle(pixel.x, pixel.y, size, size, Color::from_rgba(255, 255, 255, 60));
        draw_rectangle_lines(pixel.x, pixel.y, size, size, 2.0, PINK);
        draw_text(bonus_label(bonus), pixel.x + size * 0.3, pixel.y + size * 0.75, size * 0.7, PINK);
    }

    fn draw_effect(&mut self, effect: &Effect, mapper: &CoordinateMapper, now: Millis, duration: Millis) {
        let size = mapper.tile_size() as f32;
        let progress = effect.progress(now, duration);
        let cx = effect.position.x + size / 2.0;
        let cy = effect.position.y + size / 2.0;

        let (radius, color) = match effect.kind {
            EffectKind::Explosion => (size * (0.3 + 0.5 * progress), ORANGE),
            EffectKind::Impact => (size * (0.1 + 0.2 * progress), YELLOW),
        };
        let faded = Color::new(color.r, color.g, color.b, 1.0 - progress * 0.8);
        draw_circle(cx, cy, radius, faded);
    }

    fn draw_hud(&mut self, session: &Session) {
        let reconciler = session.reconciler();
        let registry = reconciler.registry();

        draw_text(phase_label(session.phase()), 10.0, 20.0, 16.0, WHITE);

        if let Some(room) = session.room_id() {
            draw_text(&format!("room {}", room), 10.0, 36.0, 14.0, LIGHTGRAY);
        }

        if let Some(tank) = reconciler.local_tank() {
            let status = format!(
                "hp {}  ammo {}/{}",
                tank.health,
                tank.max_bullets - tank.active_bullets.min(tank.max_bullets),
                tank.max_bullets
            );
            draw_text(&status, 10.0, 52.0, 14.0, WHITE);
        }

        let counts = format!(
            "{} players  {} enemies  {} bullets",
            registry.players.len(),
            registry.enemies.len(),
            registry.bullets.len()
        );
        draw_text(&counts, 10.0, self.height - 10.0, 14.0, LIGHTGRAY);

        if session.phase() == Phase::BaseDestroyed {
            let text = "GAME OVER";
            let dims = measure_text(text, None, 48, 1.0);
            draw_text(text, (self.width - dims.width) / 2.0, self.height / 2.0, 48.0, RED);
        }
    }

    fn draw_notice(&mut self, message: &str) {
        let banner_height = 70.0;
        let top = (self.height - banner_height) / 2.0;
        draw_rectangle(0.0, top, self.width, banner_height, Color::from_rgba(120, 0, 0, 230));
        draw_text(message, 20.0, top + 30.0, 22.0, WHITE);
        draw_text("Press Enter to dismiss", 20.0, top + 55.0, 14.0, LIGHTGRAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tiles_are_not_drawn() {
        assert!(tile_color(TileCode::Empty).is_none());
        assert!(tile_color(TileCode::Brick).is_some());
        assert!(tile_color(TileCode::Bush).is_some());
    }

    #[test]
    fn test_every_bonus_has_a_label() {
        let labels: std::collections::BTreeSet<&str> =
            BonusType::ALL.iter().map(|b| bonus_label(*b)).collect();
        assert_eq!(labels.len(), BonusType::ALL.len());
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(phase_label(Phase::Closed), "disconnected");
        assert_eq!(phase_label(Phase::Playing), "playing");
    }

    #[test]
    fn test_base_color_marks_destruction() {
        assert_ne!(base_color(Phase::Playing), base_color(Phase::BaseDestroyed));
        assert_eq!(base_color(Phase::Playing), base_color(Phase::AwaitingStart));
    }

    #[test]
    fn test_tints_are_distinct() {
        let tints = [StatusTint::Yellow, StatusTint::Blue, StatusTint::Purple, StatusTint::Green];
        for (i, a) in tints.iter().enumerate() {
            for b in &tints[i + 1..] {
                assert_ne!(tint_color(*a), tint_color(*b));
            }
        }
    }
}
