//! The sub-range composition invariant: splitting a range element at any
//! point must reproduce the full matrix, `M2 * M1 == M`, in both planes.

use approx::assert_relative_eq;
use paraxial_rs::elements::ElementType;
use paraxial_rs::matrix::RayMatrix;
use paraxial_rs::units::{Unit, Value};

fn assert_matrix_eq(actual: &RayMatrix, expected: &RayMatrix) {
    assert_relative_eq!(actual.a(), expected.a(), max_relative = 1e-9, epsilon = 1e-12);
    assert_relative_eq!(actual.b(), expected.b(), max_relative = 1e-9, epsilon = 1e-12);
    assert_relative_eq!(actual.c(), expected.c(), max_relative = 1e-9, epsilon = 1e-12);
    assert_relative_eq!(actual.d(), expected.d(), max_relative = 1e-9, epsilon = 1e-12);
}

fn check_composition(kind: ElementType, ior: Option<f64>) {
    let mut elem = kind.create();
    elem.set_param_value("L", Value::new(80.0, Unit::Mm)).unwrap();
    if let Some(n) = ior {
        elem.set_param_value("n", Value::none(n)).unwrap();
    }

    let length = elem.length_si();
    for fraction in [0.0, 0.25, 0.5, 0.75, 1.0] {
        elem.set_sub_range_si(length * fraction);

        let mt = *elem.mt();
        let composed_t = *elem.mt2().unwrap() * *elem.mt1().unwrap();
        assert_matrix_eq(&composed_t, &mt);

        let ms = *elem.ms();
        let composed_s = *elem.ms2().unwrap() * *elem.ms1().unwrap();
        assert_matrix_eq(&composed_s, &ms);
    }
}

#[test]
fn empty_range_split_composes() {
    check_composition(ElementType::EmptyRange, None);
}

#[test]
fn medium_range_split_composes() {
    check_composition(ElementType::MediumRange, Some(1.5));
}

#[test]
fn plate_split_composes() {
    check_composition(ElementType::Plate, Some(1.7));
}

#[test]
fn plate_split_crosses_the_interfaces() {
    let mut elem = ElementType::Plate.create();
    elem.set_param_value("L", Value::new(10.0, Unit::Mm)).unwrap();
    elem.set_param_value("n", Value::none(2.0)).unwrap();
    elem.set_sub_range_si(0.004);

    // The first part ends inside the medium: reduced angle, shortened path
    let m1 = elem.mt1().unwrap();
    assert_relative_eq!(m1.b(), 0.004 / 2.0, max_relative = 1e-12);
    assert_relative_eq!(m1.d(), 0.5, max_relative = 1e-12);

    // The second part exits back into air
    let m2 = elem.mt2().unwrap();
    assert_relative_eq!(m2.b(), 0.006, max_relative = 1e-12);
    assert_relative_eq!(m2.d(), 2.0, max_relative = 1e-12);
}

#[test]
fn split_recomputes_after_length_change() {
    let mut elem = ElementType::EmptyRange.create();
    elem.set_param_value("L", Value::new(100.0, Unit::Mm)).unwrap();
    elem.set_sub_range_si(0.03);
    assert_relative_eq!(elem.mt1().unwrap().b(), 0.03, max_relative = 1e-12);
    assert_relative_eq!(elem.mt2().unwrap().b(), 0.07, max_relative = 1e-12);

    // After a length edit, re-splitting restores the invariant
    elem.set_param_value("L", Value::new(50.0, Unit::Mm)).unwrap();
    elem.set_sub_range_si(0.03);
    let composed = *elem.mt2().unwrap() * *elem.mt1().unwrap();
    assert_matrix_eq(&composed, elem.mt());
    assert_relative_eq!(elem.mt2().unwrap().b(), 0.02, max_relative = 1e-12);
}

#[test]
fn degenerate_zero_length_split() {
    let mut elem = ElementType::MediumRange.create();
    elem.set_param_value("L", Value::new(0.0, Unit::Mm)).unwrap();
    elem.set_sub_range_si(0.0);

    let composed = *elem.mt2().unwrap() * *elem.mt1().unwrap();
    assert_matrix_eq(&composed, elem.mt());
    assert_matrix_eq(elem.mt(), &RayMatrix::identity());
}
