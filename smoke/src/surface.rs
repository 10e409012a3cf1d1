/// The size of the drawing surface in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Map a pixel position (origin top-left) to texture coordinates (origin
    /// bottom-left).
    pub fn texcoord(&self, x: f32, y: f32) -> [f32; 2] {
        [x / self.width as f32, 1.0 - y / self.height as f32]
    }

    /// Scale a horizontal texture-space delta so that equal screen distances
    /// produce equal deltas on both axes.
    pub fn correct_delta_x(&self, delta: f32) -> f32 {
        let aspect_ratio = self.aspect_ratio();
        if aspect_ratio < 1.0 {
            delta * aspect_ratio
        } else {
            delta
        }
    }

    pub fn correct_delta_y(&self, delta: f32) -> f32 {
        let aspect_ratio = self.aspect_ratio();
        if aspect_ratio > 1.0 {
            delta / aspect_ratio
        } else {
            delta
        }
    }

    /// The size of a grid whose shorter edge has `resolution` cells, stretched
    /// to the surface's aspect ratio.
    pub fn resolution(&self, resolution: u32) -> (u32, u32) {
        let mut aspect_ratio = self.aspect_ratio();
        if aspect_ratio < 1.0 {
            aspect_ratio = 1.0 / aspect_ratio;
        }

        let min = (resolution as f32).round().max(1.0) as u32;
        let max = (resolution as f32 * aspect_ratio).round().max(1.0) as u32;

        if self.width > self.height {
            (max, min)
        } else {
            (min, max)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_longer_axis_gets_the_larger_dimension() {
        assert_eq!(Surface::new(1280, 640).resolution(64), (128, 64));
        assert_eq!(Surface::new(640, 1280).resolution(64), (64, 128));
        assert_eq!(Surface::new(500, 500).resolution(128), (128, 128));
    }

    #[test]
    fn test_resolution_rounds_the_long_edge() {
        // 1.5 × 65 = 97.5
        assert_eq!(Surface::new(300, 200).resolution(65), (98, 65));
    }

    #[test]
    fn test_zero_sized_surface_is_clamped() {
        let surface = Surface::new(0, 0);
        assert_eq!((surface.width, surface.height), (1, 1));
        assert_eq!(surface.resolution(0), (1, 1));
    }

    #[test]
    fn test_texcoord_flips_the_vertical_axis() {
        let surface = Surface::new(200, 100);
        let [x, y] = surface.texcoord(50.0, 25.0);
        assert_relative_eq!(x, 0.25);
        assert_relative_eq!(y, 0.75);
    }

    #[test]
    fn test_corrects_deltas_on_wide_surfaces() {
        let surface = Surface::new(200, 100);
        assert_relative_eq!(surface.correct_delta_x(0.1), 0.1);
        assert_relative_eq!(surface.correct_delta_y(0.1), 0.05);
    }

    #[test]
    fn test_corrects_deltas_on_tall_surfaces() {
        let surface = Surface::new(100, 200);
        assert_relative_eq!(surface.correct_delta_x(0.1), 0.05);
        assert_relative_eq!(surface.correct_delta_y(0.1), 0.1);
    }
}
