//! Test to verify test infrastructure works correctly

mod common;

use common::builders::ProgramBuilder;
use common::mock_helpers::TestDevice;
use pcrlink::RunState;

#[test]
fn test_infrastructure_setup() {
    // Test that builders work
    let program = ProgramBuilder::new("Builder")
        .step(30, 95, "Hot")
        .repeat(2, &[(10, 60, "Warm")])
        .build();

    assert_eq!(program.title, "Builder");
    assert_eq!(program.steps().count(), 2);
}

#[test]
fn test_device_volume_setup() {
    let volume = TestDevice::new("s=inactive");
    let device = volume.open();

    assert_eq!(device.mount_path(), volume.mount_path().as_path());
    assert_eq!(device.read_status().unwrap().state, RunState::Inactive);
    assert_eq!(volume.control_contents(), "");
}

#[test]
fn test_float_comparison() {
    common::assert_float_eq(1.0, 1.0000001, 0.001);
}

#[test]
#[should_panic]
fn test_float_comparison_fails() {
    common::assert_float_eq(1.0, 2.0, 0.001);
}
