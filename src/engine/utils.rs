use crate::rng::RandomSource;

pub(super) fn squared_distance(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = ax - bx;
    let dy = ay - by;
    dx * dx + dy * dy
}

pub(super) fn cell_squared_distance(a: (i32, i32), b: (i32, i32)) -> i64 {
    let dx = (a.0 - b.0) as i64;
    let dy = (a.1 - b.1) as i64;
    dx * dx + dy * dy
}

// Axis-aligned overlap test around two centres.
pub(super) fn within_box(ax: f64, ay: f64, bx: f64, by: f64, half_w: f64, half_h: f64) -> bool {
    (ax - bx).abs() < half_w && (ay - by).abs() < half_h
}

pub(super) fn shuffle<T>(items: &mut [T], rng: &mut dyn RandomSource) {
    for idx in (1..items.len()).rev() {
        let swap_with = rng.pick_index(idx + 1);
        items.swap(idx, swap_with);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    #[test]
    fn shuffle_keeps_every_item() {
        let mut items = vec![1, 2, 3, 4, 5];
        shuffle(&mut items, &mut Rng::new(99));
        items.sort_unstable();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn box_overlap_is_strict() {
        assert!(within_box(0.0, 0.0, 19.9, -19.9, 20.0, 20.0));
        assert!(!within_box(0.0, 0.0, 20.0, 0.0, 20.0, 20.0));
        assert_eq!(cell_squared_distance((1, 2), (4, 6)), 25);
        assert_eq!(squared_distance(0.0, 0.0, 3.0, 4.0), 25.0);
    }
}
