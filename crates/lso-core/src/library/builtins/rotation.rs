//! Vector and rotation builtins

use super::{float_arg, rot_arg, vec_arg, FLOAT, ROT, VEC};
use crate::library::{LibraryTable, Signature};
use crate::math::{Quaternion, Vector};
use crate::value::Value;

fn rot_to_axis(table: &mut LibraryTable, name: &str, axis: Vector) {
    table.register(name, Signature::new(VEC, &[ROT]), move |_ctx, args| {
        Ok(Value::Vector(axis.rotate(rot_arg(args, 0)?)))
    });
}

pub(super) fn register(table: &mut LibraryTable) {
    table.register("llVecMag", Signature::new(FLOAT, &[VEC]), |_ctx, args| {
        Ok(Value::Float(vec_arg(args, 0)?.magnitude()))
    });
    table.register("llVecNorm", Signature::new(VEC, &[VEC]), |_ctx, args| {
        Ok(Value::Vector(vec_arg(args, 0)?.normalize()))
    });
    table.register("llVecDist", Signature::new(FLOAT, &[VEC, VEC]), |_ctx, args| {
        Ok(Value::Float(vec_arg(args, 0)?.distance(vec_arg(args, 1)?)))
    });

    table.register("llRot2Euler", Signature::new(VEC, &[ROT]), |_ctx, args| {
        Ok(Value::Vector(rot_arg(args, 0)?.to_euler()))
    });
    table.register("llEuler2Rot", Signature::new(ROT, &[VEC]), |_ctx, args| {
        Ok(Value::Rotation(Quaternion::from_euler(vec_arg(args, 0)?)))
    });
    table.register("llAxes2Rot", Signature::new(ROT, &[VEC, VEC, VEC]), |_ctx, args| {
        Ok(Value::Rotation(Quaternion::from_axes(
            vec_arg(args, 0)?,
            vec_arg(args, 1)?,
            vec_arg(args, 2)?,
        )))
    });

    rot_to_axis(table, "llRot2Fwd", Vector::X_AXIS);
    rot_to_axis(table, "llRot2Left", Vector::Y_AXIS);
    rot_to_axis(table, "llRot2Up", Vector::Z_AXIS);

    table.register("llRotBetween", Signature::new(ROT, &[VEC, VEC]), |_ctx, args| {
        Ok(Value::Rotation(Quaternion::between(
            vec_arg(args, 0)?,
            vec_arg(args, 1)?,
        )))
    });
    table.register("llAxisAngle2Rot", Signature::new(ROT, &[VEC, FLOAT]), |_ctx, args| {
        Ok(Value::Rotation(Quaternion::from_axis_angle(
            vec_arg(args, 0)?,
            float_arg(args, 1)?,
        )))
    });
    table.register("llRot2Axis", Signature::new(VEC, &[ROT]), |_ctx, args| {
        Ok(Value::Vector(rot_arg(args, 0)?.angle_axis().1))
    });
    table.register("llRot2Angle", Signature::new(FLOAT, &[ROT]), |_ctx, args| {
        Ok(Value::Float(rot_arg(args, 0)?.angle_axis().0))
    });
    table.register("llAngleBetween", Signature::new(FLOAT, &[ROT, ROT]), |_ctx, args| {
        Ok(Value::Float(rot_arg(args, 0)?.angle_between(rot_arg(args, 1)?)))
    });
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn vec_close(v: &Value, expected: Vector) -> bool {
        let v = v.as_vector().unwrap();
        (v.x - expected.x).abs() < 1e-4
            && (v.y - expected.y).abs() < 1e-4
            && (v.z - expected.z).abs() < 1e-4
    }

    #[test]
    fn test_vector_functions() {
        let v = Value::Vector(Vector::new(3.0, 4.0, 0.0));
        assert_eq!(call("llVecMag", &[v.clone()]), f(5.0));
        assert!(vec_close(&call("llVecNorm", &[v.clone()]), Vector::new(0.6, 0.8, 0.0)));
        assert_eq!(
            call("llVecDist", &[v, Value::Vector(Vector::ZERO)]),
            f(5.0)
        );
    }

    #[test]
    fn test_axes_of_quarter_turn() {
        let rot = call(
            "llAxisAngle2Rot",
            &[Value::Vector(Vector::Z_AXIS), f(FRAC_PI_2)],
        );
        assert!(vec_close(&call("llRot2Fwd", &[rot.clone()]), Vector::Y_AXIS));
        assert!(vec_close(
            &call("llRot2Left", &[rot.clone()]),
            Vector::new(-1.0, 0.0, 0.0)
        ));
        assert!(vec_close(&call("llRot2Up", &[rot.clone()]), Vector::Z_AXIS));

        let angle = call("llRot2Angle", &[rot.clone()]).as_float().unwrap();
        assert!((angle - FRAC_PI_2).abs() < 1e-4);
        assert!(vec_close(&call("llRot2Axis", &[rot]), Vector::Z_AXIS));
    }

    #[test]
    fn test_euler_round_trip() {
        let euler = Vector::new(0.3, -0.7, 1.2);
        let rot = call("llEuler2Rot", &[Value::Vector(euler)]);
        assert!(vec_close(&call("llRot2Euler", &[rot]), euler));
    }

    #[test]
    fn test_rot_between_maps_direction() {
        let a = Vector::new(1.0, 0.0, 0.0);
        let b = Vector::new(0.0, 0.0, 2.0);
        let rot = call("llRotBetween", &[Value::Vector(a), Value::Vector(b)]);
        assert!(vec_close(
            &Value::Vector(a.rotate(rot.as_rotation().unwrap())),
            Vector::Z_AXIS
        ));
    }

    #[test]
    fn test_angle_between_identity() {
        let id = Value::Rotation(Quaternion::IDENTITY);
        let angle = call("llAngleBetween", &[id.clone(), id]).as_float().unwrap();
        assert!(angle.abs() < 1e-3);
    }
}
