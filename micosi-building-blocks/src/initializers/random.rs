use micosi_concepts::{
    default_left, default_up, rotation_x, rotation_y, DoubleParam, Generator, Geometry, IntParam,
    Mat3, RandomEngine, Real, Segment, SetupError, SimParams, Vec3, PI,
};
use micosi_core::cell::{Cell, CellObjectProvider, MtState, PoleType};
use micosi_core::interfaces::CellInitializer;

/// Places the poles on the x axis, lets all MTs start polymerizing from length zero and puts
/// the chromosome pairs at random non-overlapping positions in the equatorial plane.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomCellInitializer {
    /// Number of chromosome pairs
    pub chr_pairs: usize,
    /// Number of MTs on each pole
    pub mts_per_pole: usize,
    /// Radius of the cell
    pub r_cell: Real,
    /// Distance between the poles
    pub l_poles: Real,
    /// Length of a chromosome
    pub cr_l: Real,
    /// Radius of the chromosome hands
    pub cr_hand_r: Real,
    /// Radius of the kinetochore
    pub cr_kin_r: Real,
    /// Rest length of the spring between sisters
    pub spring_length: Real,
    /// Number of candidate positions drawn for one pair before giving up
    pub max_attempts: usize,
}

impl RandomCellInitializer {
    /// Candidate positions drawn for one chromosome pair by default.
    pub const DEFAULT_MAX_ATTEMPTS: usize = 100_000;

    /// Reads the shape of the cell and all lengths in SI units from `params`.
    pub fn new(params: &SimParams) -> Self {
        let si = |p| params.get_double_si(p) as Real;
        Self {
            chr_pairs: params.get_int(IntParam::NCrTotal).max(0) as usize,
            mts_per_pole: params.get_int(IntParam::NMtTotal).max(0) as usize,
            r_cell: si(DoubleParam::RCell),
            l_poles: si(DoubleParam::LPoles),
            cr_l: si(DoubleParam::CrL),
            cr_hand_r: si(DoubleParam::CrHandD) / 2.0,
            cr_kin_r: si(DoubleParam::CrKinD) / 2.0,
            spring_length: si(DoubleParam::SpringLength),
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Changes the number of candidate positions drawn for one pair.
    pub fn with_max_attempts(self, max_attempts: usize) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    fn edges(&self, position: &Vec3, orientation: &Mat3) -> (Vec3, Vec3) {
        let half = orientation * default_up() * (self.cr_l / 2.0);
        (position + half, position - half)
    }

    /// Edges of the first chromosome of a pair centered at `position`.
    fn first_sister_edges(&self, position: &Vec3, orientation: &Mat3) -> (Vec3, Vec3) {
        let offset = Vec3::new(self.spring_length / 2.0, 0.0, 0.0);
        self.edges(&(position + orientation * offset), orientation)
    }

    fn fits_into_cell(&self, top: &Vec3, bottom: &Vec3) -> bool {
        let margin = self.cr_hand_r + self.spring_length / 2.0;
        top.norm() + margin < self.r_cell && bottom.norm() + margin < self.r_cell
    }

    /// Whether the pair with edges `(top, bottom)` crosses or comes too close to the pair
    /// with edges `(top2, bottom2)`.
    fn collides(&self, geometry: &Geometry, edges: (Vec3, Vec3), others: (Vec3, Vec3)) -> bool {
        let (top, bottom) = edges;
        let (top2, bottom2) = others;
        let dir1 = (bottom - top).normalize();
        let dir2 = (bottom2 - top2).normalize();

        // Both axes lie in planes orthogonal to x, intersect their projections
        let (a1, b1) = (-dir1.z as f64, dir1.y as f64);
        let (a2, b2) = (-dir2.z as f64, dir2.y as f64);
        let c1 = a1 * top.y as f64 + b1 * top.z as f64;
        let c2 = a2 * top2.y as f64 + b2 * top2.z as f64;
        let det = a1 * b2 - a2 * b1;
        if det.abs() > 1e-8 {
            let inter = Vec3::new(
                top.x,
                ((c1 * b2 - c2 * b1) / det) as Real,
                ((a1 * c2 - a2 * c1) / det) as Real,
            );
            let on_axis = |t: &Vec3, b: &Vec3| {
                let along = (inter - t).norm() + (inter - b).norm();
                (((along - self.cr_l) / self.cr_l) as f64).abs() < 1e-4
            };
            if on_axis(&top, &bottom) && on_axis(&top2, &bottom2) {
                return true;
            }
        }

        let distance = geometry.distance_segments(
            &Segment::new(bottom, top),
            &Segment::new(bottom2, top2),
        );
        let r = self.cr_hand_r.max(self.cr_kin_r);
        distance < 2.0 * r + self.spring_length
    }
}

impl CellInitializer for RandomCellInitializer {
    fn cell_config(&self) -> (usize, usize) {
        (self.chr_pairs, self.mts_per_pole)
    }

    fn initialize_cell(&self, cell: &mut Cell, rng: &mut Generator) -> Result<(), SetupError> {
        let geometry = Geometry::new(self.r_cell * 1e-5);

        let pole = default_left() * (self.l_poles / 2.0);
        cell.set_pole_positions(pole, -pole);

        for id in 0..cell.mt_count() {
            let sign = match cell.mt(id).map(|mt| mt.pole_type()) {
                Some(PoleType::Left) => 1.0,
                Some(PoleType::Right) => -1.0,
                None => return Err(SetupError(format!("MT {id} is missing"))),
            };
            let alpha = rng.next_real() as f64 * 2.0 * PI as f64;
            let dx = rng.next_real() * sign;
            let side = (1.0 - dx as f64 * dx as f64).sqrt();
            let direction = Vec3::new(dx, (side * alpha.cos()) as Real, (side * alpha.sin()) as Real);
            let mut mt = cell
                .mt_mut(id)
                .ok_or_else(|| SetupError(format!("MT {id} is missing")))?;
            mt.set_direction(&direction);
            mt.set_length(0.0);
            mt.set_state(MtState::Polymerization);
            mt.set_bound_chromosome(None);
        }

        let (left, right) = cell.pole_positions();
        let center_x = (left.x + right.x) / 2.0;
        // Candidates are checked against the first chromosome of every placed pair
        let mut placed: Vec<(Vec3, Vec3)> = Vec::with_capacity(self.chr_pairs);
        for pair in 0..cell.chromosome_count() / 2 {
            let mut attempts = 0;
            let (position, orientation) = loop {
                if attempts >= self.max_attempts {
                    return Err(SetupError(format!(
                        "could not place chromosome pair {pair} after {attempts} attempts"
                    )));
                }
                attempts += 1;
                let orientation = rotation_x(rng.next_real() * 2.0 * PI);
                let position = Vec3::new(
                    center_x,
                    rng.next_real() * (2.0 * self.r_cell) - self.r_cell,
                    rng.next_real() * (2.0 * self.r_cell) - self.r_cell,
                );
                let edges = self.edges(&position, &orientation);
                if !self.fits_into_cell(&edges.0, &edges.1) {
                    continue;
                }
                if placed
                    .iter()
                    .any(|others| self.collides(&geometry, edges, *others))
                {
                    continue;
                }
                break (position, orientation);
            };
            #[cfg(feature = "tracing")]
            tracing::trace!(pair, attempts, "placed chromosome pair");
            placed.push(self.first_sister_edges(&position, &orientation));

            let offset = Vec3::new(self.spring_length / 2.0, 0.0, 0.0);
            let second = orientation * rotation_y(PI);
            for (id, orientation) in [(2 * pair, orientation), (2 * pair + 1, second)] {
                let mut chromosome = cell
                    .chromosome_mut(id)
                    .ok_or_else(|| SetupError(format!("chromosome {id} is missing")))?;
                chromosome.set_position(&(position + orientation * offset));
                chromosome.set_orientation(&orientation);
            }
        }
        Ok(())
    }
}
