pub const FEET_PER_METER: f64 = 3.280_839_895;
pub const KNOTS_PER_MPH: f64 = 0.868_976_242;
pub const KNOTS_PER_KMH: f64 = 0.539_956_803;

pub fn meters_to_feet(meters: f64) -> f64 {
    meters * FEET_PER_METER
}

pub fn mph_to_knots(mph: f64) -> f64 {
    mph * KNOTS_PER_MPH
}

pub fn kmh_to_knots(kmh: f64) -> f64 {
    kmh * KNOTS_PER_KMH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert!((meters_to_feet(10_668.0) - 35_000.0).abs() < 0.5);
        assert!((mph_to_knots(500.0) - 434.49).abs() < 0.01);
        assert!((kmh_to_knots(926.0) - 500.0).abs() < 0.01);
        assert_eq!(mph_to_knots(0.0), 0.0);
    }
}
