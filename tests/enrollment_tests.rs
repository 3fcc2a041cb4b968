mod common;

use classroll::application::enrollment::EnrollmentRequest;
use classroll::domain::enrollment::PaymentType;
use classroll::domain::ids::{ClassId, UserId, VoucherId};
use classroll::error::{Conflict, Error, ErrorCategory};
use common::*;

fn enroll(student: &UserId, class: &ClassId, payment_type: PaymentType) -> EnrollmentRequest {
    EnrollmentRequest {
        student_id: student.clone(),
        class_id: class.clone(),
        payment_type,
        voucher_id: None,
    }
}

#[tokio::test]
async fn test_last_seat_goes_to_first_student() {
    let p = platform();
    let teacher = add_teacher(&p.stores, "t-1").await;
    let s1 = add_student(&p.stores, "s-1").await;
    let s2 = add_student(&p.stores, "s-2").await;
    let class = create_class(&p, &teacher, at_ten(10), Some(1)).await;

    p.classroom
        .enrollment
        .enroll(enroll(&s1, &class, PaymentType::Direct))
        .await
        .unwrap();
    let stored = p.stores.classes.get(&class).await.unwrap().unwrap();
    assert_eq!(stored.enrolled_students, vec![s1.clone()]);

    let err = p
        .classroom
        .enrollment
        .enroll(enroll(&s2, &class, PaymentType::Direct))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(Conflict::ClassFull(_))));
    assert!(p.classroom.catalog.is_class_full(&class).await.unwrap());
    assert_eq!(
        p.classroom.enrollment.enrollments_by_class(&class).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_voucher_enroll_without_credit() {
    let p = platform();
    let teacher = add_teacher(&p.stores, "t-1").await;
    let student = add_student(&p.stores, "s-1").await;
    let voucher = give_voucher(&p.stores, &student, 0).await;
    let class = create_class(&p, &teacher, at_ten(3), None).await;

    let err = p
        .classroom
        .enrollment
        .enroll(enroll(&student, &class, PaymentType::Voucher))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Conflict(Conflict::InsufficientVoucher(_))
    ));
    assert_eq!(err.category(), ErrorCategory::Conflict);

    let stored = p.stores.vouchers.get(&voucher).await.unwrap().unwrap();
    assert_eq!(stored.remaining_credits, 0);
    assert!(
        !p.classroom
            .enrollment
            .is_enrolled(&student, &class)
            .await
            .unwrap()
    );
    assert_eq!(p.classroom.catalog.enrollment_count(&class).await.unwrap(), 0);
}

#[tokio::test]
async fn test_student_without_any_voucher() {
    let p = platform();
    let teacher = add_teacher(&p.stores, "t-1").await;
    let student = add_student(&p.stores, "s-1").await;
    let class = create_class(&p, &teacher, at_ten(3), None).await;

    assert!(matches!(
        p.classroom
            .enrollment
            .enroll(enroll(&student, &class, PaymentType::Voucher))
            .await,
        Err(Error::Conflict(Conflict::InsufficientVoucher(_)))
    ));
}

#[tokio::test]
async fn test_rejected_voucher_enroll_leaves_no_net_debit() {
    let p = platform();
    let teacher = add_teacher(&p.stores, "t-1").await;
    let s1 = add_student(&p.stores, "s-1").await;
    let s2 = add_student(&p.stores, "s-2").await;
    let voucher = give_voucher(&p.stores, &s2, 2).await;
    let class = create_class(&p, &teacher, at_ten(3), Some(1)).await;

    p.classroom
        .enrollment
        .enroll(enroll(&s1, &class, PaymentType::Direct))
        .await
        .unwrap();
    let mut request = enroll(&s2, &class, PaymentType::Voucher);
    request.voucher_id = Some(voucher.clone());
    assert!(p.classroom.enrollment.enroll(request).await.is_err());

    assert_eq!(p.classroom.enrollment.voucher_balance(&s2).await.unwrap(), 2);
    assert!(
        p.classroom
            .enrollment
            .enrollments_by_student(&s2)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_unknown_voucher_is_not_found() {
    let p = platform();
    let teacher = add_teacher(&p.stores, "t-1").await;
    let student = add_student(&p.stores, "s-1").await;
    let class = create_class(&p, &teacher, at_ten(3), None).await;

    let mut request = enroll(&student, &class, PaymentType::Voucher);
    request.voucher_id = Some(VoucherId::from("missing"));
    let err = p.classroom.enrollment.enroll(request).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn test_unenroll_frees_the_seat() {
    let p = platform();
    let teacher = add_teacher(&p.stores, "t-1").await;
    let s1 = add_student(&p.stores, "s-1").await;
    let s2 = add_student(&p.stores, "s-2").await;
    let class = create_class(&p, &teacher, at_ten(5), Some(1)).await;

    p.classroom
        .enrollment
        .enroll(enroll(&s1, &class, PaymentType::Direct))
        .await
        .unwrap();
    p.classroom.enrollment.unenroll(&s1, &class).await.unwrap();
    p.classroom
        .enrollment
        .enroll(enroll(&s2, &class, PaymentType::Direct))
        .await
        .unwrap();

    let stored = p.stores.classes.get(&class).await.unwrap().unwrap();
    assert_eq!(stored.enrolled_students, vec![s2]);
    assert!(matches!(
        p.classroom.enrollment.unenroll(&s1, &class).await,
        Err(Error::NotFound { .. })
    ));
}
