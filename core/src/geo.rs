//! Geodesic distances and the national-territory bounding box.

/// Exclusive bounds approximating the national territory.
pub const MIN_LONGITUDE: f64 = -73.992222;
pub const MAX_LONGITUDE: f64 = -34.7916667;
pub const MIN_LATITUDE: f64 = -33.742222;
pub const MAX_LATITUDE: f64 = 5.2722222;

// WGS-84
const SEMI_MAJOR_AXIS_KM: f64 = 6378.137;
const FLATTENING: f64 = 1.0 / 298.257223563;
const MEAN_RADIUS_KM: f64 = 6371.0088;

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-12;

/// A (latitude, longitude) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// True when the coordinates fall strictly inside the bounding box.
pub fn in_national_territory(latitude: f64, longitude: f64) -> bool {
    MIN_LONGITUDE < longitude
        && longitude < MAX_LONGITUDE
        && MIN_LATITUDE < latitude
        && latitude < MAX_LATITUDE
}

/// Geodesic distance in kilometres on the WGS-84 ellipsoid (Vincenty's
/// inverse formula). Falls back to the great-circle distance when the
/// iteration does not converge, which only happens for nearly antipodal
/// points.
pub fn distance_km(a: Point, b: Point) -> f64 {
    vincenty_km(a, b).unwrap_or_else(|| haversine_km(a, b))
}

/// Sum of distances over every unordered pair of points.
pub fn sum_pairwise_km(points: &[Point]) -> f64 {
    let mut total = 0.0;
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            total += distance_km(*a, *b);
        }
    }
    total
}

fn vincenty_km(a: Point, b: Point) -> Option<f64> {
    if a == b {
        return Some(0.0);
    }

    let semi_minor = (1.0 - FLATTENING) * SEMI_MAJOR_AXIS_KM;
    let u1 = ((1.0 - FLATTENING) * a.latitude.to_radians().tan()).atan();
    let u2 = ((1.0 - FLATTENING) * b.latitude.to_radians().tan()).atan();
    let l = (b.longitude - a.longitude).to_radians();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            return Some(0.0);
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // Equatorial line: cos_sq_alpha = 0.
        let cos_2sigma_m = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };
        let c = FLATTENING / 16.0 * cos_sq_alpha * (4.0 + FLATTENING * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * FLATTENING
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

        if (lambda - previous).abs() < CONVERGENCE {
            let u_sq = cos_sq_alpha * (SEMI_MAJOR_AXIS_KM.powi(2) - semi_minor.powi(2))
                / semi_minor.powi(2);
            let big_a =
                1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = big_b
                * sin_sigma
                * (cos_2sigma_m
                    + big_b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                            - big_b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                                * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
            return Some(semi_minor * big_a * (sigma - delta_sigma));
        }
    }
    None
}

fn haversine_km(a: Point, b: Point) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * MEAN_RADIUS_KM * h.sqrt().asin()
}
