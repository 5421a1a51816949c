//! Great-circle distance and the "reports near me" filter.

use crate::models::{Location, Report};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius used when the configuration does not override it.
pub const DEFAULT_RADIUS_KM: f64 = 1.0;

/// Calculate distance between two coordinates using the Haversine formula.
/// Returns distance in kilometers.
pub fn haversine_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance from `center` to a report, or `None` when the report has no usable coordinates.
pub fn distance_to(center: &Location, report: &Report) -> Option<f64> {
    let coords = report.coordinates()?;
    Some(haversine_distance_km(
        center.latitude,
        center.longitude,
        coords.latitude,
        coords.longitude,
    ))
}

/// Returns the reports within `radius_km` of `center`, keeping their original order.
///
/// With no center, or a center whose coordinates are unusable, nothing is
/// nearby. Reports without usable coordinates never match.
pub fn filter_nearby(center: Option<&Location>, reports: &[Report], radius_km: f64) -> Vec<Report> {
    let Some(center) = center.filter(|c| c.coordinates().is_valid()) else {
        return Vec::new();
    };

    reports
        .iter()
        .filter(|report| matches!(distance_to(center, report), Some(d) if d <= radius_km))
        .cloned()
        .collect()
}

/// The report selected by default after filtering.
pub fn default_selection(nearby: &[Report]) -> Option<&Report> {
    nearby.first()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(id: u32, lat: f64, lng: f64) -> Report {
        Report::from_value(json!({
            "id": id,
            "issue_type": "pothole",
            "latitude": lat,
            "longitude": lng
        }))
        .unwrap()
    }

    fn manila() -> Location {
        Location::new("Manila, Metro Manila, Philippines", 14.5995, 120.9842)
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            ((14.5995, 120.9842), (10.3157, 123.8854)),
            ((-33.8688, 151.2093), (51.5074, -0.1278)),
            ((0.0, 179.9), (0.0, -179.9)),
        ];
        for ((a_lat, a_lon), (b_lat, b_lon)) in pairs {
            let ab = haversine_distance_km(a_lat, a_lon, b_lat, b_lon);
            let ba = haversine_distance_km(b_lat, b_lon, a_lat, a_lon);
            assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
        }
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(haversine_distance_km(14.5995, 120.9842, 14.5995, 120.9842), 0.0);
        assert_eq!(haversine_distance_km(-90.0, 0.0, -90.0, 0.0), 0.0);
    }

    #[test]
    fn manila_to_cebu_is_roughly_570_km() {
        let d = haversine_distance_km(14.5995, 120.9842, 10.3157, 123.8854);
        assert!(d > 550.0 && d < 590.0, "got {d}");
    }

    #[test]
    fn keeps_only_reports_inside_radius() {
        let reports = vec![report(1, 14.6000, 120.9850), report(2, 15.0, 121.5)];

        let nearby = filter_nearby(Some(&manila()), &reports, 1.0);

        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].id, "1");
    }

    #[test]
    fn report_exactly_on_the_radius_is_nearby() {
        let center = manila();
        let edge = report(9, 14.6085, 120.9842);
        let d = distance_to(&center, &edge).unwrap();
        assert!((d - DEFAULT_RADIUS_KM).abs() < 0.01, "got {d}");

        let nearby = filter_nearby(Some(&center), std::slice::from_ref(&edge), d);
        assert_eq!(nearby.len(), 1);

        let shrunk = filter_nearby(Some(&center), std::slice::from_ref(&edge), d - 1e-9);
        assert!(shrunk.is_empty());
    }

    #[test]
    fn missing_center_yields_nothing() {
        let reports = vec![report(1, 14.6000, 120.9850)];
        assert!(filter_nearby(None, &reports, 1.0).is_empty());

        let broken = Location::new("Nowhere", f64::NAN, 120.0);
        assert!(filter_nearby(Some(&broken), &reports, 1.0).is_empty());
    }

    #[test]
    fn growing_radius_never_drops_reports() {
        let reports = vec![
            report(1, 14.6000, 120.9850),
            report(2, 14.6100, 120.9900),
            report(3, 14.6500, 121.0300),
            report(4, 15.0, 121.5),
        ];
        let center = manila();

        let mut previous: Vec<String> = Vec::new();
        for radius in [0.1, 0.5, 1.0, 2.0, 10.0, 100.0] {
            let ids: Vec<String> = filter_nearby(Some(&center), &reports, radius)
                .into_iter()
                .map(|r| r.id)
                .collect();
            assert!(previous.iter().all(|id| ids.contains(id)));
            for r in &reports {
                if ids.contains(&r.id) {
                    assert!(distance_to(&center, r).unwrap() <= radius);
                }
            }
            previous = ids;
        }
        assert_eq!(previous.len(), 4);
    }

    #[test]
    fn malformed_report_coordinates_are_skipped() {
        let bad = Report::from_value(json!({
            "id": "bad",
            "issue_type": "graffiti",
            "latitude": "not-a-number",
            "longitude": 120.9842
        }))
        .unwrap();
        let reports = vec![bad, report(1, 14.6000, 120.9850)];

        let nearby = filter_nearby(Some(&manila()), &reports, 1.0);

        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].id, "1");
    }

    #[test]
    fn first_nearby_report_is_selected_by_default() {
        let reports = vec![report(5, 14.5996, 120.9843), report(6, 14.6000, 120.9850)];
        let nearby = filter_nearby(Some(&manila()), &reports, 1.0);
        assert_eq!(default_selection(&nearby).map(|r| r.id.as_str()), Some("5"));
        assert!(default_selection(&[]).is_none());
    }
}
