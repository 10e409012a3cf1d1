// Common geometries

#[rustfmt::skip]
pub static QUAD_VERTICES: [f32; 8] = [
    -1.0, -1.0,
    -1.0,  1.0,
     1.0,  1.0,
     1.0, -1.0,
];

#[rustfmt::skip]
pub static QUAD_INDICES: [u16; 6] = [
    0, 1, 2,
    0, 2, 3,
];
