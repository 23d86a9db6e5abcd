#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sigmoid;

impl Sigmoid {
    pub fn f(&self, z: f32) -> f32 {
        1. / (1. + (-z).exp())
    }

    /// The derivative expressed through the already activated value `a = f(z)`.
    pub fn df_from_output(&self, a: f32) -> f32 {
        a * (1. - a)
    }

    pub fn df(&self, z: f32) -> f32 {
        self.df_from_output(self.f(z))
    }
}
