//! スクリプトに公開する `Math` 名前空間
//! `random()` はゲームのシードから初期化した乱数生成器を使う。

use std::cell::RefCell;
use std::rc::Rc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rhai::{Engine, Module, FLOAT, INT};

use super::engine_namespace::RhaiResult;

/// `Math` 名前空間をインタプリタに登録する
pub fn register(engine: &mut Engine, seed: u64) {
    engine.register_static_module("Math", math_module(seed).into());
}

fn math_module(seed: u64) -> Module {
    let mut module = Module::new();
    let rng = Rc::new(RefCell::new(ChaCha8Rng::seed_from_u64(seed)));

    module.set_var("PI", std::f64::consts::PI as FLOAT);
    module.set_var("E", std::f64::consts::E as FLOAT);
    module.set_var("LN2", std::f64::consts::LN_2 as FLOAT);
    module.set_var("LN10", std::f64::consts::LN_10 as FLOAT);
    module.set_var("SQRT2", std::f64::consts::SQRT_2 as FLOAT);

    let random = Rc::clone(&rng);
    module.set_native_fn("random", move || -> RhaiResult<FLOAT> {
        Ok(random.borrow_mut().gen::<FLOAT>())
    });

    // 両端を含む
    module.set_native_fn("random_int", move |low: INT, high: INT| -> RhaiResult<INT> {
        if low > high {
            return Err(format!("random_int: low ({low}) must not exceed high ({high})").into());
        }
        Ok(rng.borrow_mut().gen_range(low..=high))
    });

    module.set_native_fn("abs", |value: INT| -> RhaiResult<INT> {
        value
            .checked_abs()
            .ok_or_else(|| format!("abs overflow: {value}").into())
    });
    module.set_native_fn("abs", |value: FLOAT| -> RhaiResult<FLOAT> { Ok(value.abs()) });
    module.set_native_fn("min", |a: INT, b: INT| -> RhaiResult<INT> { Ok(a.min(b)) });
    module.set_native_fn("min", |a: FLOAT, b: FLOAT| -> RhaiResult<FLOAT> { Ok(a.min(b)) });
    module.set_native_fn("max", |a: INT, b: INT| -> RhaiResult<INT> { Ok(a.max(b)) });
    module.set_native_fn("max", |a: FLOAT, b: FLOAT| -> RhaiResult<FLOAT> { Ok(a.max(b)) });
    module.set_native_fn("floor", |value: FLOAT| -> RhaiResult<FLOAT> { Ok(value.floor()) });
    module.set_native_fn("ceil", |value: FLOAT| -> RhaiResult<FLOAT> { Ok(value.ceil()) });
    module.set_native_fn("round", |value: FLOAT| -> RhaiResult<FLOAT> { Ok(value.round()) });
    module.set_native_fn("trunc", |value: FLOAT| -> RhaiResult<FLOAT> { Ok(value.trunc()) });
    module.set_native_fn("sqrt", |value: FLOAT| -> RhaiResult<FLOAT> { Ok(value.sqrt()) });
    module.set_native_fn("pow", |base: FLOAT, exponent: FLOAT| -> RhaiResult<FLOAT> {
        Ok(base.powf(exponent))
    });

    module
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(seed: u64) -> Engine {
        let mut engine = Engine::new();
        register(&mut engine, seed);
        engine
    }

    #[test]
    fn test_random_is_seeded() {
        let script = "[Math::random(), Math::random_int(0, 1000), Math::random()]";

        let first = engine(99).eval::<rhai::Array>(script).unwrap();
        let second = engine(99).eval::<rhai::Array>(script).unwrap();

        assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }

    #[test]
    fn test_random_range() {
        let engine = engine(3);

        for _ in 0..50 {
            let value = engine.eval::<FLOAT>("Math::random()").unwrap();
            assert!((0.0..1.0).contains(&value));

            let value = engine.eval::<INT>("Math::random_int(-2, 2)").unwrap();
            assert!((-2..=2).contains(&value));
        }

        assert!(engine.eval::<INT>("Math::random_int(5, 1)").is_err());
    }

    #[test]
    fn test_math_functions() {
        let engine = engine(0);

        assert_eq!(engine.eval::<INT>("Math::max(3, 9)").unwrap(), 9);
        assert_eq!(engine.eval::<INT>("Math::abs(-4)").unwrap(), 4);
        assert_eq!(engine.eval::<FLOAT>("Math::floor(2.7)").unwrap(), 2.0);
        assert_eq!(engine.eval::<FLOAT>("Math::pow(2.0, 10.0)").unwrap(), 1024.0);
        assert!((engine.eval::<FLOAT>("Math::PI").unwrap() - std::f64::consts::PI).abs() < 1e-12);
    }
}
