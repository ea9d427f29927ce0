//! Symmetric and triangular routine tests, plus the support-matrix
//! rejections.

use std::sync::Arc;

use gpublas::blas::{Diag, Level3, Order, Scalar, Side, Transpose, Uplo};
use gpublas::buffer::{DeviceBuffer, MatrixOperand};
use gpublas::context::{ComputeCapability, ContextRegistry};
use gpublas::dtype::{Complex64, Complex128, DType};
use gpublas::error::Error;

fn dispatcher() -> Level3<gpublas::backend::ReferenceKernels> {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = Arc::new(ContextRegistry::new());
    registry.register(0, ComputeCapability::new(8, 6));
    Level3::reference(registry)
}

fn operand_f32(data: &[f32], rows: usize, cols: usize) -> MatrixOperand {
    MatrixOperand::new(DeviceBuffer::from_slice(0, data), rows, cols).unwrap()
}

fn operand_f64(data: &[f64], rows: usize, cols: usize) -> MatrixOperand {
    MatrixOperand::new(DeviceBuffer::from_slice(0, data), rows, cols).unwrap()
}

// ============================================================================
// symm
// ============================================================================

#[test]
fn symm_f32_reads_only_the_named_triangle() {
    let blas = dispatcher();

    // A = [[1,2],[2,3]] symmetric, stored upper; the lower slot holds
    // garbage that must never be read.
    let a = operand_f32(&[1.0, 777.0, 2.0, 3.0], 2, 2);
    let b = operand_f32(&[1.0, 0.0, 0.0, 1.0], 2, 2);
    let c = MatrixOperand::new(DeviceBuffer::zeros(0, DType::F32, 4), 2, 2).unwrap();

    blas.symm(
        Order::ColMajor,
        Side::Left,
        Uplo::Upper,
        2,
        2,
        Scalar::from(1.0f32),
        &a,
        2,
        &b,
        2,
        Scalar::from(0.0f32),
        &c,
        2,
    )
    .unwrap();

    // A * I = A with the mirrored triangle.
    assert_eq!(c.buffer().to_vec::<f32>(), vec![1.0, 2.0, 2.0, 3.0]);
}

#[test]
fn symm_f64_right_side() {
    let blas = dispatcher();

    // C := B * A, A = [[2,1],[1,2]] stored lower.
    let a = operand_f64(&[2.0, 1.0, 888.0, 2.0], 2, 2);
    let b = operand_f64(&[1.0, 3.0, 2.0, 4.0], 2, 2);
    let c = MatrixOperand::new(DeviceBuffer::zeros(0, DType::F64, 4), 2, 2).unwrap();

    blas.symm(
        Order::ColMajor,
        Side::Right,
        Uplo::Lower,
        2,
        2,
        Scalar::from(1.0f64),
        &a,
        2,
        &b,
        2,
        Scalar::from(0.0f64),
        &c,
        2,
    )
    .unwrap();

    // B = [[1,2],[3,4]]; B*A = [[4,5],[10,11]]
    assert_eq!(c.buffer().to_vec::<f64>(), vec![4.0, 10.0, 5.0, 11.0]);
}

// ============================================================================
// syrk / syr2k
// ============================================================================

#[test]
fn syrk_f32_updates_only_the_upper_triangle() {
    let blas = dispatcher();

    // A = [[1,2],[3,4]] column-major.
    let a = operand_f32(&[1.0, 3.0, 2.0, 4.0], 2, 2);
    // Sentinel in the strictly-lower slot must survive the update.
    let c = operand_f32(&[0.0, -9.0, 0.0, 0.0], 2, 2);

    blas.syrk(
        Order::ColMajor,
        Uplo::Upper,
        Transpose::None,
        2,
        2,
        Scalar::from(1.0f32),
        &a,
        2,
        Scalar::from(0.0f32),
        &c,
        2,
    )
    .unwrap();

    // A*Aᵗ = [[5,11],[11,25]]; only the upper triangle lands in C.
    assert_eq!(c.buffer().to_vec::<f32>(), vec![5.0, -9.0, 11.0, 25.0]);
}

#[test]
fn syrk_f64_transposed_form() {
    let blas = dispatcher();

    // C := Aᵗ*A with A stored 3x2.
    let a = operand_f64(&[1.0, 2.0, 3.0, 0.0, 1.0, 1.0], 3, 2);
    let c = operand_f64(&[0.0, 0.0, 0.0, 0.0], 2, 2);

    blas.syrk(
        Order::ColMajor,
        Uplo::Lower,
        Transpose::Trans,
        2,
        3,
        Scalar::from(1.0f64),
        &a,
        3,
        Scalar::from(0.0f64),
        &c,
        2,
    )
    .unwrap();

    // Aᵗ*A = [[14,5],[5,2]]; lower triangle only.
    assert_eq!(c.buffer().to_vec::<f64>(), vec![14.0, 5.0, 0.0, 2.0]);
}

#[test]
fn syr2k_f64_rank_two_update() {
    let blas = dispatcher();

    // Column vectors a = [1,2], b = [3,4], k = 1.
    let a = operand_f64(&[1.0, 2.0], 2, 1);
    let b = operand_f64(&[3.0, 4.0], 2, 1);
    let c = operand_f64(&[0.0, -5.0, 0.0, 0.0], 2, 2);

    blas.syr2k(
        Order::ColMajor,
        Uplo::Upper,
        Transpose::None,
        2,
        1,
        Scalar::from(1.0f64),
        &a,
        2,
        &b,
        2,
        Scalar::from(0.0f64),
        &c,
        2,
    )
    .unwrap();

    // a*bᵗ + b*aᵗ = [[6,10],[10,16]]; upper triangle only.
    assert_eq!(c.buffer().to_vec::<f64>(), vec![6.0, -5.0, 10.0, 16.0]);
}

// ============================================================================
// trmm / trsm
// ============================================================================

#[test]
fn trmm_f64_multiplies_in_place() {
    let blas = dispatcher();

    // A = [[2,1],[0,3]] upper triangular; B = [[1,2],[3,4]].
    let a = operand_f64(&[2.0, 0.0, 1.0, 3.0], 2, 2);
    let b = operand_f64(&[1.0, 3.0, 2.0, 4.0], 2, 2);

    blas.trmm(
        Order::ColMajor,
        Side::Left,
        Uplo::Upper,
        Transpose::None,
        Diag::NonUnit,
        2,
        2,
        Scalar::from(1.0f64),
        &a,
        2,
        &b,
        2,
    )
    .unwrap();

    // A*B = [[5,8],[9,12]] overwrites B.
    assert_eq!(b.buffer().to_vec::<f64>(), vec![5.0, 9.0, 8.0, 12.0]);
}

#[test]
fn trmm_f64_unit_diagonal_ignores_stored_diagonal() {
    let blas = dispatcher();

    // Stored diagonal values are arbitrary under Diag::Unit.
    let a = operand_f64(&[42.0, 0.0, 1.0, -7.0], 2, 2);
    let b = operand_f64(&[1.0, 3.0, 2.0, 4.0], 2, 2);

    blas.trmm(
        Order::ColMajor,
        Side::Left,
        Uplo::Upper,
        Transpose::None,
        Diag::Unit,
        2,
        2,
        Scalar::from(1.0f64),
        &a,
        2,
        &b,
        2,
    )
    .unwrap();

    // Effective A = [[1,1],[0,1]]; A*B = [[4,6],[3,4]].
    assert_eq!(b.buffer().to_vec::<f64>(), vec![4.0, 3.0, 6.0, 4.0]);
}

#[test]
fn trsm_f32_solves_left_lower() {
    let blas = dispatcher();

    // A = [[2,0],[1,4]] lower triangular. With X = [[1,2],[3,4]],
    // B = A*X = [[2,4],[13,18]]; the solve must recover X.
    let a = operand_f32(&[2.0, 1.0, 0.0, 4.0], 2, 2);
    let b = operand_f32(&[2.0, 13.0, 4.0, 18.0], 2, 2);

    blas.trsm(
        Order::ColMajor,
        Side::Left,
        Uplo::Lower,
        Transpose::None,
        Diag::NonUnit,
        2,
        2,
        Scalar::from(1.0f32),
        &a,
        2,
        &b,
        2,
    )
    .unwrap();

    assert_eq!(b.buffer().to_vec::<f32>(), vec![1.0, 3.0, 2.0, 4.0]);
}

#[test]
fn trsm_f64_row_major_adaptation() {
    let blas = dispatcher();

    // Row-major upper triangular A = [[2,1],[0,4]], B = A*X with
    // X = [[1,0],[2,3]] (row-major), so B = [[4,3],[8,12]].
    let a = operand_f64(&[2.0, 1.0, 0.0, 4.0], 2, 2);
    let b = operand_f64(&[4.0, 3.0, 8.0, 12.0], 2, 2);

    blas.trsm(
        Order::RowMajor,
        Side::Left,
        Uplo::Upper,
        Transpose::None,
        Diag::NonUnit,
        2,
        2,
        Scalar::from(1.0f64),
        &a,
        2,
        &b,
        2,
    )
    .unwrap();

    assert_eq!(b.buffer().to_vec::<f64>(), vec![1.0, 0.0, 2.0, 3.0]);
}

// ============================================================================
// Support matrix
// ============================================================================

#[test]
fn single_precision_syr2k_has_no_kernel() {
    let blas = dispatcher();

    let a = operand_f32(&[1.0, 2.0], 2, 1);
    let b = operand_f32(&[3.0, 4.0], 2, 1);
    let c = operand_f32(&[0.0; 4], 2, 2);

    let err = blas
        .syr2k(
            Order::ColMajor,
            Uplo::Upper,
            Transpose::None,
            2,
            1,
            Scalar::from(1.0f32),
            &a,
            2,
            &b,
            2,
            Scalar::from(0.0f32),
            &c,
            2,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UnsupportedOperation {
            routine: "syr2k",
            dtype: DType::F32,
        }
    ));
    assert_eq!(c.buffer().bind_count(), 0);
}

#[test]
fn single_precision_trmm_has_no_kernel() {
    let blas = dispatcher();

    let a = operand_f32(&[1.0, 0.0, 0.0, 1.0], 2, 2);
    let b = operand_f32(&[1.0; 4], 2, 2);
    let before = b.buffer().to_vec::<f32>();

    let err = blas
        .trmm(
            Order::ColMajor,
            Side::Left,
            Uplo::Upper,
            Transpose::None,
            Diag::NonUnit,
            2,
            2,
            Scalar::from(1.0f32),
            &a,
            2,
            &b,
            2,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UnsupportedOperation {
            routine: "trmm",
            dtype: DType::F32,
        }
    ));
    assert_eq!(b.buffer().to_vec::<f32>(), before);
}

#[test]
fn half_precision_symm_is_rejected() {
    let blas = dispatcher();

    let ones: Vec<half::f16> = vec![half::f16::ONE; 4];
    let a = MatrixOperand::new(DeviceBuffer::from_slice(0, &ones), 2, 2).unwrap();
    let b = MatrixOperand::new(DeviceBuffer::from_slice(0, &ones), 2, 2).unwrap();
    let c = MatrixOperand::new(DeviceBuffer::zeros(0, DType::F16, 4), 2, 2).unwrap();

    let err = blas
        .symm(
            Order::ColMajor,
            Side::Left,
            Uplo::Upper,
            2,
            2,
            Scalar::half(1.0),
            &a,
            2,
            &b,
            2,
            Scalar::half(0.0),
            &c,
            2,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UnsupportedOperation {
            routine: "symm",
            dtype: DType::F16,
        }
    ));
}

#[test]
fn complex_trsm_fails_loudly_instead_of_silently_returning() {
    let blas = dispatcher();

    let data = [Complex64::new(1.0, 0.0), Complex64::new(0.0, 1.0)];
    let a = MatrixOperand::new(DeviceBuffer::from_slice(0, &data), 1, 2).unwrap();
    let b = MatrixOperand::new(DeviceBuffer::from_slice(0, &data), 1, 2).unwrap();
    let before = b.buffer().as_bytes().to_vec();

    let err = blas
        .trsm(
            Order::ColMajor,
            Side::Left,
            Uplo::Lower,
            Transpose::None,
            Diag::NonUnit,
            1,
            2,
            Scalar::from(Complex64::new(1.0, 0.0)),
            &a,
            1,
            &b,
            1,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        Error::UnsupportedOperation {
            routine: "trsm",
            dtype: DType::Complex64,
        }
    ));
    assert_eq!(b.buffer().as_bytes(), &before[..]);
    assert_eq!(b.buffer().bind_count(), 0);
}

#[test]
fn hermitian_routines_are_unsupported() {
    let blas = dispatcher();

    let data = [Complex128::new(1.0, 2.0), Complex128::new(3.0, 4.0)];
    let a = MatrixOperand::new(DeviceBuffer::from_slice(0, &data), 1, 2).unwrap();
    let b = MatrixOperand::new(DeviceBuffer::from_slice(0, &data), 1, 2).unwrap();
    let c = MatrixOperand::new(DeviceBuffer::zeros(0, DType::Complex128, 4), 2, 2).unwrap();
    let alpha = Scalar::from(Complex128::new(1.0, 0.0));
    let beta = Scalar::from(Complex128::new(0.0, 0.0));

    let err = blas
        .hemm(
            Order::ColMajor,
            Side::Left,
            Uplo::Upper,
            2,
            2,
            alpha,
            &a,
            2,
            &b,
            2,
            beta,
            &c,
            2,
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperation { routine: "hemm", .. }));

    let err = blas
        .herk(
            Order::ColMajor,
            Uplo::Upper,
            Transpose::None,
            2,
            1,
            alpha,
            &a,
            2,
            beta,
            &c,
            2,
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperation { routine: "herk", .. }));

    let err = blas
        .her2k(
            Order::ColMajor,
            Uplo::Upper,
            Transpose::None,
            2,
            1,
            alpha,
            &a,
            2,
            &b,
            2,
            beta,
            &c,
            2,
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperation { routine: "her2k", .. }));

    // None of the rejections may have touched a buffer.
    assert_eq!(a.buffer().bind_count(), 0);
    assert_eq!(b.buffer().bind_count(), 0);
    assert_eq!(c.buffer().bind_count(), 0);
}

#[test]
fn symm_row_major_flips_side_and_uplo() {
    let blas = dispatcher();

    // Row-major: A = [[1,2],[2,3]] stored upper, C := A*B with B = I.
    let a = operand_f32(&[1.0, 2.0, 999.0, 3.0], 2, 2);
    let b = operand_f32(&[1.0, 0.0, 0.0, 1.0], 2, 2);
    let c = MatrixOperand::new(DeviceBuffer::zeros(0, DType::F32, 4), 2, 2).unwrap();

    blas.symm(
        Order::RowMajor,
        Side::Left,
        Uplo::Upper,
        2,
        2,
        Scalar::from(1.0f32),
        &a,
        2,
        &b,
        2,
        Scalar::from(0.0f32),
        &c,
        2,
    )
    .unwrap();

    assert_eq!(c.buffer().to_vec::<f32>(), vec![1.0, 2.0, 2.0, 3.0]);
}
