#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Relu;

impl Relu {
    pub fn f(&self, z: f32) -> f32 {
        z.max(0.)
    }

    /// The subgradient at zero is taken as zero.
    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { 0. }
    }
}
