//! Validate every generated shader variant with naga.
//!
//! The structural option matrix is small enough to sweep exhaustively, so a
//! codegen regression fails here instead of at pipeline creation time.

use naga::front::wgsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use nbpe::kernel::{
    position_pass_source, velocity_pass_source, BoundaryShape, DistanceFalloff, KernelOptions,
    NuclearPotential, SimSpace,
};

fn validate(source: &str, label: String) {
    let module = match wgsl::parse_str(source) {
        Ok(module) => module,
        Err(err) => panic!("{label}: parse error:\n{}", err.emit_to_string(source)),
    };
    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    if let Err(err) = validator.validate(&module) {
        panic!("{label}: validation error: {err}");
    }
}

fn all_options() -> Vec<KernelOptions> {
    let mut options = Vec::new();
    for potential in NuclearPotential::ALL {
        for boundary in [BoundaryShape::Sphere, BoundaryShape::Box] {
            for falloff in [DistanceFalloff::InverseSquare, DistanceFalloff::InverseLinear] {
                for space in [SimSpace::Two, SimSpace::Three] {
                    for boundary_enabled in [false, true] {
                        options.push(KernelOptions {
                            potential,
                            boundary,
                            falloff,
                            space,
                            boundary_enabled,
                        });
                    }
                }
            }
        }
    }
    options
}

#[test]
fn every_velocity_pass_variant_validates() {
    for options in all_options() {
        validate(
            &velocity_pass_source(&options),
            format!("velocity pass {options:?}"),
        );
    }
}

#[test]
fn every_position_pass_variant_validates() {
    for options in all_options() {
        validate(
            &position_pass_source(&options),
            format!("position pass {options:?}"),
        );
    }
}

#[test]
fn option_matrix_is_the_expected_size() {
    // 7 potentials x 2 boundaries x 2 falloffs x 2 spaces x 2 toggles
    assert_eq!(all_options().len(), 112);
}
