// Original source code idea from
// https://github.com/nwojke/deep_sort/blob/master/deep_sort/kalman_filter.py
//
use crate::utils::bbox::BoundingBox;
use nalgebra::{SMatrix, SVector};

pub const DIM_BOX: usize = 4;
pub const DIM_BOX_X2: usize = DIM_BOX * 2;

const DT: u64 = 1;

/// Mean and covariance of the constant-velocity motion state
/// (center_x, center_y, width, height and their velocities).
///
#[derive(Copy, Clone, Debug)]
pub struct KalmanState {
    pub mean: SVector<f32, DIM_BOX_X2>,
    pub covariance: SMatrix<f32, DIM_BOX_X2, DIM_BOX_X2>,
}

impl KalmanState {
    /// The bounding box described by the positional part of the mean.
    ///
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::from_cxcywh(self.mean[0], self.mean[1], self.mean[2], self.mean[3])
    }
}

/// Kalman filter
///
#[derive(Debug)]
pub struct KalmanFilter {
    motion_matrix: SMatrix<f32, DIM_BOX_X2, DIM_BOX_X2>,
    update_matrix: SMatrix<f32, DIM_BOX, DIM_BOX_X2>,
    std_position_weight: f32,
    std_velocity_weight: f32,
}

/// Default initializer
impl Default for KalmanFilter {
    fn default() -> Self {
        KalmanFilter::new(1.0 / 20.0, 1.0 / 160.0)
    }
}

impl KalmanFilter {
    /// Constructor with custom weights (shouldn't be used without the need)
    pub fn new(position_weight: f32, velocity_weight: f32) -> Self {
        let mut motion_matrix: SMatrix<f32, DIM_BOX_X2, DIM_BOX_X2> = SMatrix::identity();

        for i in 0..DIM_BOX {
            motion_matrix[(i, DIM_BOX + i)] = DT as f32;
        }

        KalmanFilter {
            motion_matrix,
            update_matrix: SMatrix::identity(),
            std_position_weight: position_weight,
            std_velocity_weight: velocity_weight,
        }
    }

    // Noise std deviations scale with the box extent, (w, h, w, h) pattern.
    fn std_position(&self, k: f32, w: f32, h: f32) -> [f32; DIM_BOX] {
        let pw = k * self.std_position_weight;
        [pw * w, pw * h, pw * w, pw * h]
    }

    fn std_velocity(&self, k: f32, w: f32, h: f32) -> [f32; DIM_BOX] {
        let vw = k * self.std_velocity_weight;
        [vw * w, vw * h, vw * w, vw * h]
    }

    /// Initialize the filter with the first observation
    ///
    pub fn initiate(&self, measurement: [f32; DIM_BOX]) -> KalmanState {
        let [xc, yc, w, h] = measurement;
        let mean: SVector<f32, DIM_BOX_X2> =
            SVector::from_iterator([xc, yc, w, h, 0.0, 0.0, 0.0, 0.0]);

        let mut std: SVector<f32, DIM_BOX_X2> = SVector::from_iterator(
            self.std_position(2.0, w, h)
                .into_iter()
                .chain(self.std_velocity(10.0, w, h)),
        );

        std = std.component_mul(&std);

        let covariance: SMatrix<f32, DIM_BOX_X2, DIM_BOX_X2> = SMatrix::from_diagonal(&std);
        KalmanState { mean, covariance }
    }

    /// Predicts the state from the last state
    ///
    pub fn predict(&self, state: &KalmanState) -> KalmanState {
        let (mean, covariance) = (state.mean, state.covariance);
        let std_pos = self.std_position(1.0, mean[2], mean[3]);
        let std_vel = self.std_velocity(1.0, mean[2], mean[3]);

        let mut std: SVector<f32, DIM_BOX_X2> =
            SVector::from_iterator(std_pos.into_iter().chain(std_vel));

        std = std.component_mul(&std);

        let motion_cov: SMatrix<f32, DIM_BOX_X2, DIM_BOX_X2> = SMatrix::from_diagonal(&std);

        let mean = self.motion_matrix * mean;
        let covariance =
            self.motion_matrix * covariance * self.motion_matrix.transpose() + motion_cov;
        KalmanState { mean, covariance }
    }

    fn project(
        &self,
        mean: SVector<f32, DIM_BOX_X2>,
        covariance: SMatrix<f32, DIM_BOX_X2, DIM_BOX_X2>,
    ) -> (
        SVector<f32, DIM_BOX>,
        SMatrix<f32, DIM_BOX, DIM_BOX>,
    ) {
        let mut std: SVector<f32, DIM_BOX> =
            SVector::from_iterator(self.std_position(1.0, mean[2], mean[3]));

        std = std.component_mul(&std);

        let innovation_cov: SMatrix<f32, DIM_BOX, DIM_BOX> = SMatrix::from_diagonal(&std);

        let mean = self.update_matrix * mean;
        let covariance =
            self.update_matrix * covariance * self.update_matrix.transpose() + innovation_cov;
        (mean, covariance)
    }

    /// Updates the state with the current observation
    ///
    pub fn update(&self, state: &KalmanState, measurement: [f32; DIM_BOX]) -> KalmanState {
        let (mean, covariance) = (state.mean, state.covariance);
        let (projected_mean, projected_cov) = self.project(mean, covariance);
        let b = (covariance * self.update_matrix.transpose()).transpose();
        // The projected covariance is positive definite by construction.
        let kalman_gain = projected_cov.cholesky().unwrap().solve(&b);

        let innovation = SVector::from_iterator(measurement) - projected_mean;
        let innovation: SMatrix<f32, 1, DIM_BOX> = innovation.transpose();

        let mean = mean + (innovation * kalman_gain).transpose();
        let covariance = covariance - kalman_gain.transpose() * projected_cov * kalman_gain;
        KalmanState { mean, covariance }
    }
}
