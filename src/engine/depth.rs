/// Depth buffer produced by one inference call.
///
/// Values are relative depth in row-major order. After `normalized` they lie
/// in `[0, 1]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DepthMap {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl DepthMap {
    /// Min-max scale into `[0, 1]`. A flat or non-finite map becomes all zeros.
    pub fn normalized(mut self) -> Self {
        let (min, max) = self
            .data
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        if !range.is_finite() || range <= f32::EPSILON {
            self.data.iter_mut().for_each(|v| *v = 0.0);
            return self;
        }
        for v in self.data.iter_mut() {
            *v = if v.is_finite() { (*v - min) / range } else { 0.0 };
        }
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
