use proptest::prelude::*;

use pietcc::vm::runtime::{Instruction, Runtime, Stack};

fn runtime(stack: Vec<i64>) -> Runtime<Vec<u8>> {
    let mut rt = Runtime::new(Vec::new(), Vec::new());
    rt.stack = Stack::from(stack);
    rt
}

proptest! {
    #[test]
    fn duplicate_then_pop_is_identity(stack in prop::collection::vec(any::<i64>(), 0..8)) {
        let mut rt = runtime(stack.clone());
        rt.execute(Instruction::Duplicate, 1).unwrap();
        rt.execute(Instruction::Pop, 1).unwrap();
        prop_assert_eq!(rt.stack.as_slice(), stack.as_slice());
    }

    #[test]
    fn divide_floors(b in -1000i64..1000, a in (-50i64..50).prop_filter("nonzero", |a| *a != 0)) {
        let mut rt = runtime(vec![b, a]);
        rt.execute(Instruction::Divide, 1).unwrap();
        let floor = (b as f64 / a as f64).floor() as i64;
        prop_assert_eq!(rt.stack.as_slice(), &[floor][..]);
    }

    #[test]
    fn modulo_takes_divisor_sign(b in -1000i64..1000, a in (-50i64..50).prop_filter("nonzero", |a| *a != 0)) {
        let mut rt = runtime(vec![b, a]);
        rt.execute(Instruction::Mod, 1).unwrap();
        let r = rt.stack.peek().unwrap();
        prop_assert_eq!((b - r) % a, 0);
        prop_assert!(r == 0 || (r < 0) == (a < 0));
        prop_assert!(r.abs() < a.abs());
    }

    #[test]
    fn underflow_leaves_stack_alone(stack in prop::collection::vec(any::<i64>(), 0..2)) {
        for inst in [Instruction::Add, Instruction::Divide, Instruction::Roll, Instruction::Greater] {
            let mut rt = runtime(stack.clone());
            rt.execute(inst, 1).unwrap();
            prop_assert_eq!(rt.stack.as_slice(), stack.as_slice());
        }
    }

    #[test]
    fn division_by_zero_is_ignored(b in any::<i64>()) {
        for inst in [Instruction::Divide, Instruction::Mod] {
            let mut rt = runtime(vec![b, 0]);
            rt.execute(inst, 1).unwrap();
            prop_assert_eq!(rt.stack.as_slice(), &[b, 0][..]);
        }
    }
}
