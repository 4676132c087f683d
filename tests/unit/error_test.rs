//! Tests for error types

use prometheus_cook_scheduler::core::CookError;

#[test]
fn test_unresolved_package_error() {
    let err = CookError::UnresolvedPackage("/Engine/A".to_string());
    assert_eq!(format!("{}", err), "unresolved package name: /Engine/A");
}

#[test]
fn test_missing_file_error() {
    let err = CookError::MissingFile("/Game/A".to_string());
    assert_eq!(format!("{}", err), "package not found on disk: /Game/A");
}

#[test]
fn test_file_collision_error() {
    let err = CookError::FileCollision {
        package: "/Game/W/_Generated_/Cell_0".to_string(),
        file: "Content/W/_Generated_/Cell_0.pkg".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "generated package /Game/W/_Generated_/Cell_0 collides with existing file Content/W/_Generated_/Cell_0.pkg"
    );
}

#[test]
fn test_missing_create_as_map_error() {
    let err = CookError::MissingCreateAsMap {
        splitter: "cells".to_string(),
        relative_path: "Cell_0".to_string(),
    };
    assert_eq!(format!("{}", err), "splitter cells did not set CreateAsMap for Cell_0");
}

#[test]
fn test_duplicate_generated_package_error() {
    let err = CookError::DuplicateGeneratedPackage {
        splitter: "cells".to_string(),
        package: "/Game/W/_Generated_/Cell_0".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "splitter cells generated /Game/W/_Generated_/Cell_0 more than once"
    );
}

#[test]
fn test_missing_component_error() {
    let err = CookError::MissingComponent("cook driver");
    assert_eq!(format!("{}", err), "missing component: cook driver");
}

#[test]
fn test_capacity_exceeded_error() {
    let err = CookError::CapacityExceeded;
    assert_eq!(format!("{}", err), "capacity exceeded");
}

#[test]
fn test_app_result_wraps_cook_error() {
    fn lookup() -> prometheus_cook_scheduler::core::AppResult<()> {
        Err(CookError::InvalidConfig("cluster_batch_size must be greater than 0".to_string()))?;
        Ok(())
    }
    let err = lookup().unwrap_err();
    assert!(err.downcast_ref::<CookError>().is_some());
    assert_eq!(
        err.to_string(),
        "invalid configuration: cluster_batch_size must be greater than 0"
    );
}
