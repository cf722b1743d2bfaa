//! Linear-scan allocation proper (§4.4 "2. Allocation") and the final
//! operand-rewriting pass that replaces every virtual register with
//! its assigned physical register.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::asm::reg::ALLOCATION_ORDER;
use crate::asm::{AsmFunction, AsmOperand, PhysicalRegister, RegRef, VReg};
use crate::error::{CodegenError, CodegenResult};

/// A vreg is pre-colored if instruction selection pinned it to a
/// physical register at creation time — recognizable, before
/// [`super::interval::build_intervals`] runs, as `assigned_physical`
/// set with no interval yet recorded. Capture that set up front: once
/// intervals are built every used vreg (pre-colored or not) has
/// `live_start`/`live_end` populated, so `VRegInfo::is_precolored`
/// itself stops being a reliable test.
pub fn precolored_vregs(func: &AsmFunction) -> FxHashSet<VReg> {
    func.vregs()
        .iter()
        .filter(|(_, info)| info.is_precolored())
        .map(|(v, _)| v)
        .collect()
}

/// Assigns a physical register to every vreg with a recorded interval,
/// honoring pre-coloring, in vreg creation order, using the linear-scan
/// algorithm of §4.4. Mutates each non-pre-colored vreg's
/// `assigned_physical` in place.
pub fn assign_registers(func: &mut AsmFunction, precolored: &FxHashSet<VReg>) -> CodegenResult<()> {
    let mut free: FxHashSet<PhysicalRegister> = ALLOCATION_ORDER.iter().copied().collect();
    // Active intervals ordered by `live_end` ascending, per §4.4's
    // "insert into active in order of live_end ascending".
    let mut active: Vec<(VReg, PhysicalRegister, usize)> = Vec::new();

    let vregs: Vec<VReg> = func.vregs().keys().collect();
    for v in vregs {
        let (start, end) = match (func.vreg_info(v).live_start, func.vreg_info(v).live_end) {
            (Some(s), Some(e)) => (s, e),
            _ => continue,
        };

        active.retain(|&(_, reg, active_end)| {
            if active_end < start {
                free.insert(reg);
                false
            } else {
                true
            }
        });

        let assigned = if precolored.contains(&v) {
            let reg = func
                .vreg_info(v)
                .assigned_physical
                .expect("precolored vreg recorded without a register");
            if !free.remove(&reg) {
                return Err(CodegenError::invariant(format!(
                    "pre-colored register {reg} for {v} is still live from an earlier use at instruction {start}"
                )));
            }
            reg
        } else {
            let reg = *ALLOCATION_ORDER
                .iter()
                .find(|r| free.contains(r))
                .ok_or_else(|| {
                    CodegenError::exhausted(format!(
                        "register allocator ran out of physical registers for {v} (spilling is unsupported)"
                    ))
                })?;
            free.remove(&reg);
            func.vreg_info_mut(v).assigned_physical = Some(reg);
            reg
        };

        let pos = active.partition_point(|&(_, _, e)| e <= end);
        active.insert(pos, (v, assigned, end));
    }
    Ok(())
}

/// Replaces every `AsmOperand` that mentions a virtual register with
/// the physical register allocation assigned it (§4.4 "Operand
/// rewriting"). Run after [`assign_registers`] and after call-site
/// saves have been spliced in, so no vreg survives the body.
pub fn rewrite_operands_to_physical(func: &mut AsmFunction) -> CodegenResult<()> {
    let assigned: FxHashMap<VReg, PhysicalRegister> = func
        .vregs()
        .iter()
        .filter_map(|(v, info)| info.assigned_physical.map(|r| (v, r)))
        .collect();
    for instr in func.body.iter_mut() {
        for op in instr.operands.iter_mut() {
            replace_vreg(op, &assigned)?;
        }
    }
    Ok(())
}

fn replace_vreg(op: &mut AsmOperand, assigned: &FxHashMap<VReg, PhysicalRegister>) -> CodegenResult<()> {
    let target = match op {
        AsmOperand::Reg { reg, .. } => reg,
        AsmOperand::Mem { base, .. } => base,
        _ => return Ok(()),
    };
    if let RegRef::Virtual(v) = *target {
        let phys = assigned
            .get(&v)
            .copied()
            .ok_or_else(|| CodegenError::invariant(format!("{v} was never assigned a physical register")))?;
        *target = RegRef::Physical(phys);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{imm, phys, vreg, AsmFunction, AsmOpcode};
    use crate::regalloc::interval::build_intervals;

    #[test]
    fn disjoint_vregs_can_share_a_register() {
        let mut func = AsmFunction::new();
        let a = func.new_vreg();
        let b = func.new_vreg();
        func.emit2(AsmOpcode::Mov, vreg(a, 32), imm(1));
        func.emit2(AsmOpcode::Add, vreg(a, 32), imm(1));
        func.emit2(AsmOpcode::Mov, vreg(b, 32), imm(2));
        build_intervals(&mut func);
        let precolored = precolored_vregs(&func);
        assign_registers(&mut func, &precolored).unwrap();
        assert_eq!(func.vreg_info(a).assigned_physical, func.vreg_info(b).assigned_physical);
    }

    #[test]
    fn overlapping_vregs_get_different_registers() {
        let mut func = AsmFunction::new();
        let a = func.new_vreg();
        let b = func.new_vreg();
        func.emit2(AsmOpcode::Mov, vreg(a, 32), imm(1));
        func.emit2(AsmOpcode::Mov, vreg(b, 32), imm(2));
        func.emit2(AsmOpcode::Add, vreg(a, 32), vreg(b, 32));
        build_intervals(&mut func);
        let precolored = precolored_vregs(&func);
        assign_registers(&mut func, &precolored).unwrap();
        assert_ne!(func.vreg_info(a).assigned_physical, func.vreg_info(b).assigned_physical);
    }

    #[test]
    fn precolored_vreg_claims_its_register() {
        let mut func = AsmFunction::new();
        let rdi = func.new_precolored_vreg(PhysicalRegister::Rdi);
        func.emit2(AsmOpcode::Mov, phys(PhysicalRegister::Rax, 64), vreg(rdi, 64));
        build_intervals(&mut func);
        let precolored = precolored_vregs(&func);
        assign_registers(&mut func, &precolored).unwrap();
        assert_eq!(func.vreg_info(rdi).assigned_physical, Some(PhysicalRegister::Rdi));
    }

    #[test]
    fn rewrite_leaves_no_virtual_register_behind() {
        let mut func = AsmFunction::new();
        let a = func.new_vreg();
        func.emit2(AsmOpcode::Mov, vreg(a, 32), imm(7));
        build_intervals(&mut func);
        let precolored = precolored_vregs(&func);
        assign_registers(&mut func, &precolored).unwrap();
        rewrite_operands_to_physical(&mut func).unwrap();
        for instr in &func.body {
            for op in &instr.operands {
                assert!(op.vreg().is_none());
            }
        }
    }
}
