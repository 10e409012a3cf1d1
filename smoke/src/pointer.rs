use crate::color::{self, Rgb};
use crate::rng;
use crate::settings::Settings;
use crate::surface::Surface;

#[derive(Clone, Debug, PartialEq)]
pub struct Pointer {
    pub id: i64,
    pub texcoord: [f32; 2],
    pub prev_texcoord: [f32; 2],
    pub delta: [f32; 2],
    pub down: bool,
    pub moved: bool,
    pub color: Rgb,
}

impl Default for Pointer {
    fn default() -> Self {
        Self {
            id: -1,
            texcoord: [0.0, 0.0],
            prev_texcoord: [0.0, 0.0],
            delta: [0.0, 0.0],
            down: false,
            moved: false,
            color: Rgb::new(30.0, 0.0, 300.0),
        }
    }
}

/// A Gaussian impulse of force and dye at a point in texture space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub color: Rgb,
}

/// Every input source that ever pressed, plus the queue of pending random
/// splat bursts.
#[derive(Debug, Default)]
pub struct Pointers {
    pointers: Vec<Pointer>,
    splat_stack: Vec<u32>,
    color_timer: f32,
}

impl Pointers {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pointer> {
        self.pointers.iter()
    }

    pub fn find_pointer(&self, id: i64) -> Option<&Pointer> {
        self.pointers.iter().find(|pointer| pointer.id == id)
    }

    /// Start tracking a pointer, or return the one already tracked under `id`.
    pub fn add_pointer(&mut self, id: i64) -> &mut Pointer {
        match self.pointers.iter().position(|pointer| pointer.id == id) {
            Some(index) => &mut self.pointers[index],
            None => {
                self.pointers.push(Pointer {
                    id,
                    ..Default::default()
                });
                let last = self.pointers.len() - 1;
                &mut self.pointers[last]
            }
        }
    }

    pub fn update_pointer_down_data(
        &mut self,
        id: i64,
        x: f32,
        y: f32,
        color: Option<Rgb>,
        surface: Surface,
        settings: &Settings,
    ) {
        let color = if settings.colorful {
            color::generate_color()
        } else {
            color.unwrap_or(settings.color).normalize()
        };

        let pointer = self.add_pointer(id);
        let texcoord = surface.texcoord(x, y);
        pointer.id = id;
        pointer.down = true;
        pointer.moved = false;
        pointer.texcoord = texcoord;
        pointer.prev_texcoord = texcoord;
        pointer.delta = [0.0, 0.0];
        pointer.color = color;
    }

    /// Track a move. Pointers that aren't down ignore it.
    pub fn update_pointer_move_data(
        &mut self,
        id: i64,
        x: f32,
        y: f32,
        color: Option<Rgb>,
        surface: Surface,
    ) {
        let pointer = match self.pointers.iter_mut().find(|pointer| pointer.id == id) {
            Some(pointer) if pointer.down => pointer,
            _ => return,
        };

        pointer.prev_texcoord = pointer.texcoord;
        pointer.texcoord = surface.texcoord(x, y);
        pointer.delta = [
            surface.correct_delta_x(pointer.texcoord[0] - pointer.prev_texcoord[0]),
            surface.correct_delta_y(pointer.texcoord[1] - pointer.prev_texcoord[1]),
        ];
        pointer.moved = pointer.delta[0].abs() > 0.0 || pointer.delta[1].abs() > 0.0;

        if let Some(color) = color {
            pointer.color = color.normalize();
        }
    }

    pub fn update_pointer_up_data(&mut self, id: i64) {
        if let Some(pointer) = self.pointers.iter_mut().find(|pointer| pointer.id == id) {
            pointer.down = false;
        }
    }

    /// Drive a pointer from a single stream of positions: the first position
    /// presses it, every following one moves it.
    pub fn do_effect(
        &mut self,
        id: i64,
        x: f32,
        y: f32,
        color: Option<Rgb>,
        surface: Surface,
        settings: &Settings,
    ) {
        if !self.add_pointer(id).down {
            self.update_pointer_down_data(id, x, y, color, surface, settings);
        }

        self.update_pointer_move_data(id, x, y, color, surface);
    }

    /// Advance the color cycle. Every pointer gets a new color each time the
    /// timer wraps.
    pub fn update_colors(&mut self, dt: f32, settings: &Settings) {
        if !settings.colorful {
            return;
        }

        self.color_timer += dt * settings.color_update_speed;
        if self.color_timer >= 1.0 {
            self.color_timer = wrap(self.color_timer, 0.0, 1.0);
            for pointer in self.pointers.iter_mut() {
                pointer.color = color::generate_color();
            }
        }
    }

    /// Collect a splat for every pointer that moved since the last call.
    pub fn take_splats(&mut self, splat_force: f32) -> Vec<Splat> {
        self.pointers
            .iter_mut()
            .filter(|pointer| pointer.moved)
            .map(|pointer| {
                pointer.moved = false;
                Splat {
                    x: pointer.texcoord[0],
                    y: pointer.texcoord[1],
                    dx: pointer.delta[0] * splat_force,
                    dy: pointer.delta[1] * splat_force,
                    color: pointer.color,
                }
            })
            .collect()
    }

    pub fn push_random_splats(&mut self, count: u32) {
        self.splat_stack.push(count);
    }

    /// Pop one pending burst and generate its splats.
    pub fn take_random_splats(&mut self) -> Vec<Splat> {
        match self.splat_stack.pop() {
            Some(count) => random_splats(count),
            None => Vec::new(),
        }
    }
}

pub fn random_splats(count: u32) -> Vec<Splat> {
    (0..count)
        .map(|_| {
            let color = color::generate_color() * 10.0;
            Splat {
                x: rng::gen::<f32>(),
                y: rng::gen::<f32>(),
                dx: 1000.0 * (rng::gen::<f32>() - 0.5),
                dy: 1000.0 * (rng::gen::<f32>() - 0.5),
                color,
            }
        })
        .collect()
}

fn wrap(value: f32, min: f32, max: f32) -> f32 {
    let range = max - min;
    if range == 0.0 {
        return min;
    }
    (value - min) % range + min
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn surface() -> Surface {
        Surface::new(200, 100)
    }

    #[test]
    fn test_down_initialises_the_pointer() {
        let mut pointers = Pointers::new();
        let settings = Settings::default();
        pointers.update_pointer_down_data(7, 50.0, 25.0, None, surface(), &settings);

        let pointer = pointers.find_pointer(7).unwrap();
        assert!(pointer.down);
        assert!(!pointer.moved);
        assert_eq!(pointer.texcoord, pointer.prev_texcoord);
        assert_eq!(pointer.delta, [0.0, 0.0]);
        assert_relative_eq!(pointer.texcoord[0], 0.25);
        assert_relative_eq!(pointer.texcoord[1], 0.75);
        assert_eq!(pointer.color, settings.color.normalize());
    }

    #[test]
    fn test_down_uses_supplied_color() {
        let mut pointers = Pointers::new();
        let color = Rgb::new(255.0, 0.0, 0.0);
        pointers.update_pointer_down_data(1, 0.0, 0.0, Some(color), surface(), &Default::default());

        assert_eq!(pointers.find_pointer(1).unwrap().color, Rgb::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_move_without_down_is_inert() {
        let mut pointers = Pointers::new();
        pointers.add_pointer(3);
        pointers.update_pointer_move_data(3, 100.0, 50.0, None, surface());
        pointers.update_pointer_move_data(3, 150.0, 10.0, None, surface());

        assert!(!pointers.find_pointer(3).unwrap().moved);
        assert!(pointers.take_splats(6000.0).is_empty());
    }

    #[test]
    fn test_move_after_up_is_inert() {
        let mut pointers = Pointers::new();
        let settings = Settings::default();
        pointers.update_pointer_down_data(1, 10.0, 10.0, None, surface(), &settings);
        pointers.update_pointer_up_data(1);
        pointers.update_pointer_move_data(1, 90.0, 90.0, None, surface());

        assert_eq!(pointers.len(), 1);
        assert!(pointers.take_splats(6000.0).is_empty());
    }

    #[test]
    fn test_move_produces_an_aspect_corrected_splat() {
        let mut pointers = Pointers::new();
        let settings = Settings::default();
        pointers.update_pointer_down_data(1, 100.0, 50.0, None, surface(), &settings);
        pointers.update_pointer_move_data(1, 120.0, 40.0, None, surface());

        let pointer = pointers.find_pointer(1).unwrap();
        assert!(pointer.moved);
        assert_relative_eq!(pointer.delta[0], 0.1, epsilon = 1e-6);
        // 0.1 in texture space, divided by the 2:1 aspect ratio.
        assert_relative_eq!(pointer.delta[1], 0.05, epsilon = 1e-6);

        let splats = pointers.take_splats(1000.0);
        assert_eq!(splats.len(), 1);
        assert_relative_eq!(splats[0].dx, 100.0, epsilon = 1e-3);
        assert_relative_eq!(splats[0].dy, 50.0, epsilon = 1e-3);

        // The splat consumed the motion.
        assert!(pointers.take_splats(1000.0).is_empty());
    }

    #[test]
    fn test_zero_motion_does_not_move() {
        let mut pointers = Pointers::new();
        pointers.update_pointer_down_data(1, 10.0, 10.0, None, surface(), &Default::default());
        pointers.update_pointer_move_data(1, 10.0, 10.0, None, surface());

        assert!(!pointers.find_pointer(1).unwrap().moved);
    }

    #[test]
    fn test_add_pointer_is_unique_per_id() {
        let mut pointers = Pointers::new();
        pointers.add_pointer(1);
        pointers.add_pointer(2);
        pointers.add_pointer(1).down = true;

        assert_eq!(pointers.len(), 2);
        assert!(pointers.find_pointer(1).unwrap().down);
    }

    #[test]
    fn test_do_effect_presses_then_moves() {
        let mut pointers = Pointers::new();
        let settings = Settings::default();

        pointers.do_effect(9, 100.0, 50.0, None, surface(), &settings);
        assert!(pointers.find_pointer(9).unwrap().down);
        assert!(pointers.take_splats(1.0).is_empty());

        pointers.do_effect(9, 110.0, 50.0, None, surface(), &settings);
        assert_eq!(pointers.take_splats(1.0).len(), 1);
    }

    #[test]
    fn test_color_cycle_wraps() {
        rng::init_from_seed(&Some("cycle".to_string()));
        let mut pointers = Pointers::new();
        let settings = Settings {
            colorful: true,
            color_update_speed: 10.0,
            ..Default::default()
        };
        pointers.update_pointer_down_data(1, 0.0, 0.0, None, surface(), &settings);
        pointers.add_pointer(1).color = Rgb::new(0.0, 0.0, 0.0);

        pointers.update_colors(0.05, &settings);
        assert_relative_eq!(pointers.color_timer, 0.5);
        assert_eq!(pointers.find_pointer(1).unwrap().color, Rgb::new(0.0, 0.0, 0.0));

        pointers.update_colors(0.07, &settings);
        assert_relative_eq!(pointers.color_timer, 0.2, epsilon = 1e-5);
        assert_ne!(pointers.find_pointer(1).unwrap().color, Rgb::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_color_cycle_is_off_by_default() {
        let mut pointers = Pointers::new();
        pointers.update_colors(10.0, &Settings::default());
        assert_eq!(pointers.color_timer, 0.0);
    }

    #[test]
    fn test_random_splats_pop_one_burst_per_call() {
        rng::init_from_seed(&Some("bursts".to_string()));
        let mut pointers = Pointers::new();
        pointers.push_random_splats(3);
        pointers.push_random_splats(5);

        let splats = pointers.take_random_splats();
        assert_eq!(splats.len(), 5);
        for splat in &splats {
            assert!((0.0..1.0).contains(&splat.x));
            assert!((0.0..1.0).contains(&splat.y));
            assert!(splat.dx.abs() <= 500.0 && splat.dy.abs() <= 500.0);
        }

        assert_eq!(pointers.take_random_splats().len(), 3);
        assert!(pointers.take_random_splats().is_empty());
    }

    #[test]
    fn test_wrap() {
        assert_relative_eq!(wrap(1.25, 0.0, 1.0), 0.25);
        assert_relative_eq!(wrap(0.5, 0.0, 0.0), 0.0);
    }
}
