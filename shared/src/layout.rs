//! Space geometry for rectangular lots striped into two facing rows.

use crate::lot::Coord;

fn lerp(p: Coord, q: Coord, t: f64) -> Coord {
    [p[0] + (q[0] - p[0]) * t, p[1] + (q[1] - p[1]) * t]
}

/// `n + 1` evenly spaced points from `p` to `q`, both ends included.
fn divide(p: Coord, q: Coord, n: usize) -> Vec<Coord> {
    (0..=n).map(|i| lerp(p, q, i as f64 / n as f64)).collect()
}

/// Split the quadrilateral `a, b, c, d` (in ring order) into two rows of
/// `per_row` spaces each.
///
/// Row one runs along edge `a → b`, row two along `d → c`; the rows meet on
/// the line joining the midpoints of `a → d` and `b → c`. Works for any
/// orientation. Returns row one followed by row two, each space a 4-vertex
/// ring.
pub fn diagonal_spaces(a: Coord, b: Coord, c: Coord, d: Coord, per_row: usize) -> Vec<Vec<Coord>> {
    if per_row == 0 {
        return Vec::new();
    }

    let top = divide(a, b, per_row);
    let middle = divide(lerp(a, d, 0.5), lerp(b, c, 0.5), per_row);
    let bottom = divide(d, c, per_row);

    let row = |near: &[Coord], far: &[Coord]| -> Vec<Vec<Coord>> {
        (0..per_row)
            .map(|i| vec![near[i], near[i + 1], far[i + 1], far[i]])
            .collect()
    };

    let mut spaces = row(&top, &middle);
    spaces.extend(row(&middle, &bottom));
    spaces
}

#[cfg(test)]
mod tests {
    use super::diagonal_spaces;

    #[test]
    fn unit_square_splits_into_quadrants() {
        let spaces = diagonal_spaces([0.0, 0.0], [0.0, 2.0], [2.0, 2.0], [2.0, 0.0], 2);

        assert_eq!(spaces.len(), 4);
        assert_eq!(
            spaces[0],
            vec![[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]
        );
        assert_eq!(
            spaces[3],
            vec![[1.0, 1.0], [1.0, 2.0], [2.0, 2.0], [2.0, 1.0]]
        );
    }

    #[test]
    fn every_space_is_a_quad_and_rows_share_the_midline() {
        let a = [38.030907, -78.511921];
        let b = [38.031354, -78.511280];
        let c = [38.031283, -78.511202];
        let d = [38.030836, -78.511848];
        let per_row = 29;

        let spaces = diagonal_spaces(a, b, c, d, per_row);

        assert_eq!(spaces.len(), per_row * 2);
        assert!(spaces.iter().all(|ring| ring.len() == 4));
        for i in 0..per_row {
            let upper = &spaces[i];
            let lower = &spaces[per_row + i];
            assert_eq!(upper[3], lower[0]);
            assert_eq!(upper[2], lower[1]);
        }
        assert_eq!(spaces[0][0], a);
        let end = spaces[per_row - 1][1];
        assert!((end[0] - b[0]).abs() < 1e-12 && (end[1] - b[1]).abs() < 1e-12);
    }

    #[test]
    fn zero_per_row_yields_nothing() {
        assert!(diagonal_spaces([0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], 0).is_empty());
    }
}
