//! Kernel configuration and WGSL generation.
//!
//! The structural options below are baked into the compute shaders at
//! generation time: each combination produces a distinct pair of WGSL modules
//! (velocity pass + position pass) with the selected potential shape, falloff
//! exponent, and boundary geometry inlined. Changing any of them requires a
//! kernel rebuild; runtime-tunable values go through
//! [`crate::physics::Physics`] instead and are plain uniform updates.
//!
//! Both passes iterate one thread per particle slot and read only the frozen
//! buffers of the previous pass, so no synchronization is needed inside a
//! pass. The velocity pass runs the O(n²) pair loop; the position pass
//! integrates the freshly written velocities.

/// Threads per workgroup for both compute passes.
pub const WORKGROUP_SIZE: u32 = 256;

/// Shape of the short-range nuclear term, evaluated on the normalized
/// distance ratio `x = d / nuclear_range` (the Hooke shape uses the linear
/// ramp `x = 2d / nuclear_range - 1` instead).
///
/// Positive values attract, negative values repel. The shape is selected at
/// shader-generation time, never branched per pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NuclearPotential {
    /// Linear attraction fading to zero at the range edge.
    Peak,

    /// Spring toward the half-range equilibrium: repels inside it, attracts
    /// outside it. Evaluated on the linear ramp instead of the ratio.
    Hooke,

    /// Single full sine period across the range: attraction inside the
    /// half-range shell, repulsion beyond it.
    #[default]
    Wave,

    /// Two sine periods with exponential decay, producing nested shells.
    DampedWave,

    /// Screened attraction, strongest near contact and dying off
    /// exponentially.
    Yukawa,

    /// Hard repulsive core inside a quarter of the range, gentle flat
    /// attraction outside it.
    Well,

    /// Steep short-range repulsion with a mid-range attractive tail.
    LennardJones,
}

impl NuclearPotential {
    /// All shapes, in UI order.
    pub const ALL: [NuclearPotential; 7] = [
        NuclearPotential::Peak,
        NuclearPotential::Hooke,
        NuclearPotential::Wave,
        NuclearPotential::DampedWave,
        NuclearPotential::Yukawa,
        NuclearPotential::Well,
        NuclearPotential::LennardJones,
    ];

    /// WGSL expression over `x` for this shape.
    pub fn to_wgsl_expr(&self) -> &'static str {
        match self {
            NuclearPotential::Peak => "1.0 - x",
            NuclearPotential::Hooke => "x",
            NuclearPotential::Wave => "sin(6.2831853 * x)",
            NuclearPotential::DampedWave => "sin(12.566371 * x) * exp(-3.0 * x)",
            NuclearPotential::Yukawa => "exp(-4.0 * x) / (x + 0.05)",
            NuclearPotential::Well => "select(1.0, -6.0, x < 0.25)",
            NuclearPotential::LennardJones => {
                "pow(0.4 / (x + 0.01), 6.0) * (1.0 - pow(0.4 / (x + 0.01), 6.0))"
            }
        }
    }

    /// CPU evaluation of the same expression, kept in lockstep with
    /// [`Self::to_wgsl_expr`].
    pub fn evaluate(&self, x: f32) -> f32 {
        match self {
            NuclearPotential::Peak => 1.0 - x,
            NuclearPotential::Hooke => x,
            NuclearPotential::Wave => (6.283_185_3 * x).sin(),
            NuclearPotential::DampedWave => (12.566_371 * x).sin() * (-3.0 * x).exp(),
            NuclearPotential::Yukawa => (-4.0 * x).exp() / (x + 0.05),
            NuclearPotential::Well => {
                if x < 0.25 {
                    -6.0
                } else {
                    1.0
                }
            }
            NuclearPotential::LennardJones => {
                let p6 = (0.4 / (x + 0.01)).powi(6);
                p6 * (1.0 - p6)
            }
        }
    }

    /// Normalized input for this shape given a separation and the range.
    pub fn normalize(&self, distance: f32, range: f32) -> f32 {
        match self {
            NuclearPotential::Hooke => 2.0 * distance / range - 1.0,
            _ => distance / range,
        }
    }

    fn x_line(&self) -> &'static str {
        match self {
            NuclearPotential::Hooke => {
                "let x = 2.0 * sqrt(d2) / physics.nuclear.x - 1.0;"
            }
            _ => "let x = sqrt(d2) / physics.nuclear.x;",
        }
    }
}

/// Geometry of the reflective boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundaryShape {
    /// Sphere of radius `boundary_distance` around the origin.
    #[default]
    Sphere,
    /// Axis-aligned cube of half-extent `boundary_distance`.
    Box,
}

/// Denominator of the long-range gravity/electric terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DistanceFalloff {
    /// `d²` denominator: inverse-square force.
    #[default]
    InverseSquare,
    /// `d` denominator: inverse-linear force.
    InverseLinear,
}

impl DistanceFalloff {
    fn to_wgsl_line(&self) -> &'static str {
        match self {
            DistanceFalloff::InverseSquare => "let denom = d2;",
            DistanceFalloff::InverseLinear => "let denom = sqrt(d2);",
        }
    }

    /// CPU evaluation of the denominator.
    pub fn denominator(&self, d2: f32) -> f32 {
        match self {
            DistanceFalloff::InverseSquare => d2,
            DistanceFalloff::InverseLinear => d2.sqrt(),
        }
    }
}

/// Dimensionality of the simulation volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SimSpace {
    /// Plane simulation: z components are forced to zero in both passes.
    Two,
    /// Full 3D.
    #[default]
    Three,
}

/// Structural kernel configuration. Changing any field tears the kernel down
/// and rebuilds shaders, pipelines, and buffers from scratch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KernelOptions {
    pub potential: NuclearPotential,
    pub boundary: BoundaryShape,
    pub falloff: DistanceFalloff,
    pub space: SimSpace,
    pub boundary_enabled: bool,
}

/// Shared WGSL header: buffer layout comments, physics uniform struct, kind
/// constants, and the color-affinity helpers.
const WGSL_COMMON: &str = r#"struct Physics {
    // x: force_constant, y: mass_constant, z: charge_constant, w: nuclear_constant
    force: vec4<f32>,
    // x: nuclear_range, y: nuclear_range^2, z: min_distance^2, w: color mixing flag
    nuclear: vec4<f32>,
    // x: boundary_distance, y: boundary_damping
    boundary: vec4<f32>,
};

const KIND_UNDEFINED: f32 = -1.0;
const KIND_DEFAULT: f32 = 0.0;
const KIND_PROBE: f32 = 1.0;
const KIND_FIXED: f32 = 2.0;
"#;

const WGSL_COLOR: &str = r#"
fn color_index(nuclear_charge: f32) -> u32 {
    return min(u32(abs(nuclear_charge)), 3u);
}

// Three unit vectors at 120 degrees: same color dots to +1, different colors
// to -0.5. Class 0 is colorless and mixes with everything at full strength.
fn color_affinity(a: u32, b: u32) -> f32 {
    if (a == 0u || b == 0u) {
        return 1.0;
    }
    var table = array<vec3<f32>, 3>(
        vec3<f32>(1.0, 0.0, 0.0),
        vec3<f32>(-0.5, 0.8660254, 0.0),
        vec3<f32>(-0.5, -0.8660254, 0.0),
    );
    return dot(table[a - 1u], table[b - 1u]);
}
"#;

/// Generate the velocity-pass compute shader for the given options.
///
/// Bindings: 0 properties (read), 1 position source (read), 2 velocity
/// source (read), 3 velocity target (write), 4 physics uniform.
pub fn velocity_pass_source(options: &KernelOptions) -> String {
    let potential_expr = options.potential.to_wgsl_expr();
    let x_line = options.potential.x_line();
    let falloff_line = options.falloff.to_wgsl_line();

    let boundary_block = if options.boundary_enabled {
        match options.boundary {
            BoundaryShape::Sphere => {
                r#"
    // Reflect predicted boundary crossings; capture runaways outside the band.
    if (kind1 == KIND_DEFAULT) {
        let limit = physics.boundary.x;
        let next_pos = pos1.xyz + velocity;
        let dist = length(next_pos);
        if (dist >= limit) {
            if (dist < limit * 1.01) {
                let normal = next_pos / dist;
                velocity = (velocity - 2.0 * dot(velocity, normal) * normal) * physics.boundary.y;
            } else {
                velocity = vec3<f32>(0.0);
            }
        }
    }
"#
            }
            BoundaryShape::Box => {
                r#"
    // Reflect predicted boundary crossings; capture runaways outside the band.
    if (kind1 == KIND_DEFAULT) {
        let limit = physics.boundary.x;
        let next_pos = pos1.xyz + velocity;
        if (any(abs(next_pos) >= vec3<f32>(limit * 1.01))) {
            velocity = vec3<f32>(0.0);
        } else {
            if (abs(next_pos.x) >= limit) { velocity.x = -velocity.x * physics.boundary.y; }
            if (abs(next_pos.y) >= limit) { velocity.y = -velocity.y * physics.boundary.y; }
            if (abs(next_pos.z) >= limit) { velocity.z = -velocity.z * physics.boundary.y; }
        }
    }
"#
            }
        }
    } else {
        ""
    };

    let space_line = match options.space {
        SimSpace::Two => "    velocity.z = 0.0;\n",
        SimSpace::Three => "",
    };

    format!(
        r#"{WGSL_COMMON}
@group(0) @binding(0) var<storage, read> properties: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read> position_in: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> velocity_in: array<vec4<f32>>;
@group(0) @binding(3) var<storage, read_write> velocity_out: array<vec4<f32>>;
@group(0) @binding(4) var<uniform> physics: Physics;
{WGSL_COLOR}
fn nuclear_potential(x: f32) -> f32 {{
    return {potential_expr};
}}

@compute @workgroup_size({WORKGROUP_SIZE})
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let index = gid.x;
    let count = arrayLength(&position_in);
    if (index >= count) {{
        return;
    }}

    let pos1 = position_in[index];
    let vel1 = velocity_in[index];
    let props1 = properties[index];
    let kind1 = pos1.w;

    if (kind1 == KIND_UNDEFINED) {{
        velocity_out[index] = vec4<f32>(0.0);
        return;
    }}

    let mass1 = props1.y;
    let color1 = color_index(props1.w);
    let min_distance2 = physics.nuclear.z;

    var force = vec3<f32>(0.0);
    var collisions = vel1.w;

    for (var j = 0u; j < count; j = j + 1u) {{
        if (j == index) {{
            continue;
        }}
        let pos2 = position_in[j];
        let kind2 = pos2.w;
        // Probes and empty slots exert no force on anything.
        if (kind2 != KIND_DEFAULT && kind2 != KIND_FIXED) {{
            continue;
        }}

        let props2 = properties[j];
        let d_pos = pos2.xyz - pos1.xyz;
        var d2 = dot(d_pos, d_pos);

        if (d2 <= min_distance2) {{
            if (kind1 != KIND_PROBE) {{
                // Inelastic momentum exchange along the separation axis.
                let total_mass = mass1 + props2.y;
                if (total_mass == 0.0) {{
                    continue;
                }}
                let s = 2.0 * mass1 * props2.y / total_mass;
                let dv = velocity_in[j].xyz - vel1.xyz;
                if (d2 == 0.0) {{
                    force += s * dv;
                }} else {{
                    force += s * dot(dv, d_pos) / d2 * d_pos;
                }}
                collisions += 1.0;
                continue;
            }}
            // Probes sample the field instead of colliding.
            d2 = min_distance2;
        }}
        if (d2 == 0.0) {{
            continue;
        }}

        var strength = 0.0;
        if (d2 <= physics.nuclear.y) {{
            {x_line}
            var nuclear = physics.force.w * props1.w * props2.w * nuclear_potential(x);
            if (physics.nuclear.w != 0.0) {{
                nuclear *= color_affinity(color1, color_index(props2.w));
            }}
            strength += nuclear;
        }}
        {falloff_line}
        strength += physics.force.y * mass1 * props2.y / denom;
        strength -= physics.force.z * props1.z * props2.z / denom;

        force += d_pos * (strength * inverseSqrt(d2));
    }}

    force *= physics.force.x;

    var velocity = vel1.xyz;
    if (kind1 == KIND_DEFAULT) {{
        if (mass1 == 0.0) {{
            velocity += force;
        }} else {{
            velocity += force / abs(mass1);
        }}
    }} else if (kind1 == KIND_PROBE) {{
        // Probes report the instantaneous field force directly.
        velocity = force;
    }}
{boundary_block}{space_line}
    velocity_out[index] = vec4<f32>(velocity, collisions);
}}
"#
    )
}

/// Generate the position-pass compute shader for the given options.
///
/// Bindings: 0 position source (read), 1 velocity target from the velocity
/// pass (read), 2 position target (write), 3 physics uniform.
pub fn position_pass_source(options: &KernelOptions) -> String {
    let clamp_block = if options.boundary_enabled {
        match options.boundary {
            BoundaryShape::Sphere => {
                r#"
        let limit = physics.boundary.x;
        let dist = length(position);
        if (dist > limit * 1.01) {
            position = position / dist * limit;
        }
"#
            }
            BoundaryShape::Box => {
                r#"
        let limit = physics.boundary.x;
        if (abs(position.x) > limit * 1.01) { position.x = sign(position.x) * limit; }
        if (abs(position.y) > limit * 1.01) { position.y = sign(position.y) * limit; }
        if (abs(position.z) > limit * 1.01) { position.z = sign(position.z) * limit; }
"#
            }
        }
    } else {
        ""
    };

    let space_line = match options.space {
        SimSpace::Two => "    position.z = 0.0;\n",
        SimSpace::Three => "",
    };

    format!(
        r#"{WGSL_COMMON}
@group(0) @binding(0) var<storage, read> position_in: array<vec4<f32>>;
@group(0) @binding(1) var<storage, read> velocity_in: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read_write> position_out: array<vec4<f32>>;
@group(0) @binding(3) var<uniform> physics: Physics;

@compute @workgroup_size({WORKGROUP_SIZE})
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {{
    let index = gid.x;
    let count = arrayLength(&position_in);
    if (index >= count) {{
        return;
    }}

    let pos1 = position_in[index];
    var position = pos1.xyz;
    let kind = pos1.w;

    // Fixed and probe positions are never advanced here; probes are
    // repositioned by the host, fixed particles never move.
    if (kind == KIND_DEFAULT) {{
        position += velocity_in[index].xyz;
{clamp_block}    }}
{space_line}
    position_out[index] = vec4<f32>(position, kind);
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_potential_has_a_distinct_expression() {
        let exprs: Vec<&str> = NuclearPotential::ALL
            .iter()
            .map(|p| p.to_wgsl_expr())
            .collect();
        for (i, a) in exprs.iter().enumerate() {
            for b in exprs.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn hooke_uses_the_linear_ramp() {
        assert_eq!(NuclearPotential::Hooke.normalize(0.0, 4.0), -1.0);
        assert_eq!(NuclearPotential::Hooke.normalize(2.0, 4.0), 0.0);
        assert_eq!(NuclearPotential::Hooke.normalize(4.0, 4.0), 1.0);
        assert_eq!(NuclearPotential::Wave.normalize(2.0, 4.0), 0.5);
    }

    #[test]
    fn boundary_block_only_emitted_when_enabled() {
        let mut options = KernelOptions::default();
        options.boundary_enabled = false;
        assert!(!velocity_pass_source(&options).contains("physics.boundary.x"));
        options.boundary_enabled = true;
        assert!(velocity_pass_source(&options).contains("physics.boundary.x"));
        assert!(position_pass_source(&options).contains("limit * 1.01"));
    }

    #[test]
    fn two_d_mode_zeroes_z_in_both_passes() {
        let options = KernelOptions {
            space: SimSpace::Two,
            ..KernelOptions::default()
        };
        assert!(velocity_pass_source(&options).contains("velocity.z = 0.0;"));
        assert!(position_pass_source(&options).contains("position.z = 0.0;"));
    }

    #[test]
    fn falloff_switches_the_denominator() {
        let sq = KernelOptions::default();
        let lin = KernelOptions {
            falloff: DistanceFalloff::InverseLinear,
            ..KernelOptions::default()
        };
        assert!(velocity_pass_source(&sq).contains("let denom = d2;"));
        assert!(velocity_pass_source(&lin).contains("let denom = sqrt(d2);"));
    }

    #[test]
    fn well_shape_is_repulsive_inside_the_core() {
        assert!(NuclearPotential::Well.evaluate(0.1) < 0.0);
        assert!(NuclearPotential::Well.evaluate(0.5) > 0.0);
    }
}
