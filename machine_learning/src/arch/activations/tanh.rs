#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tanh;

impl Tanh {
    pub fn f(&self, z: f32) -> f32 {
        z.tanh()
    }

    pub fn df(&self, z: f32) -> f32 {
        let a = z.tanh();
        1. - a * a
    }
}
