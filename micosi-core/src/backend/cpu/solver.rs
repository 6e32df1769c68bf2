use micosi_concepts::Real;

/// Augmented 6x7 system of the rigid body motion.
///
/// Unknowns are ordered `Vx, Wx, Vy, Wy, Vz, Wz`, the last column holds the right-hand side.
pub type MotionSystem = [[Real; 7]; 6];

/// Solves the system in place by Givens rotations with partial pivoting.
///
/// Every row is first scaled by its largest coefficient.
/// Returns [None] if a row or a pivot is exactly zero.
/// Otherwise the solution is stored in the last column and returned.
pub fn solve_motion_system(mat: &mut MotionSystem) -> Option<[Real; 6]> {
    for row in mat.iter_mut() {
        let max = row[..6].iter().fold(0.0 as Real, |acc, v| acc.max(v.abs()));
        if !(max > 0.0) {
            return None;
        }
        for v in row.iter_mut() {
            *v /= max;
        }
    }

    for line in 0..5 {
        let mut max_line = line;
        let mut max = mat[line][line].abs();
        for i in line + 1..6 {
            if mat[i][line].abs() > max {
                max = mat[i][line].abs();
                max_line = i;
            }
        }
        if !(max > 0.0) {
            return None;
        }
        mat.swap(line, max_line);
        for i in line + 1..6 {
            let denom = (mat[line][line] * mat[line][line] + mat[i][line] * mat[i][line]).sqrt();
            let c = mat[line][line] / denom;
            let s = mat[i][line] / denom;
            for j in line..7 {
                let fir = mat[line][j];
                let sec = mat[i][j];
                mat[line][j] = c * fir + s * sec;
                mat[i][j] = -s * fir + c * sec;
            }
        }
    }

    for line in (0..6).rev() {
        if !(mat[line][line].abs() > 0.0) {
            return None;
        }
        mat[line][6] /= mat[line][line];
        mat[line][line] = 1.0;
        for i in 0..line {
            mat[i][6] -= mat[line][6] * mat[i][line];
            mat[i][line] = 0.0;
        }
    }

    Some([mat[0][6], mat[1][6], mat[2][6], mat[3][6], mat[4][6], mat[5][6]])
}
