use nemul_vm::{Errno, ProcessState, ProcessTable, INIT_PID, MAX_PROCESSES};

#[test]
fn child_is_an_isolated_copy() {
    let mut table = ProcessTable::new();
    {
        let init = table.find_mut(INIT_PID).unwrap();
        init.cpu.regs[0] = 0x1234;
        init.cpu.regs[5] = 55;
        init.cpu.cpsr |= 0x2000_0000;
        init.set_env(b"PATH=/bin").unwrap();
        init.mem.as_mut().unwrap()[0x2000] = 0xAA;
    }

    let child = table.fork(INIT_PID).unwrap();
    assert_eq!(child, 1 + MAX_PROCESSES as u32);

    {
        let c = table.find(child).unwrap();
        assert_eq!(c.state, ProcessState::Alive);
        assert_eq!(c.ppid, INIT_PID);
        assert_eq!(c.cpu.regs[0], 0);
        assert_eq!(c.cpu.regs[5], 55);
        assert_eq!(c.cpu.cpsr & 0x2000_0000, 0x2000_0000);
        assert_eq!(c.env, b"PATH=/bin");
        assert_eq!(c.mem.as_ref().unwrap()[0x2000], 0xAA);
    }

    {
        let c = table.find_mut(child).unwrap();
        c.mem.as_mut().unwrap()[0x2000] = 0xBB;
        c.cpu.regs[5] = 66;
    }
    {
        let p = table.find_mut(INIT_PID).unwrap();
        assert_eq!(p.cpu.regs[0], 0x1234);
        assert_eq!(p.cpu.regs[5], 55);
        assert_eq!(p.mem.as_ref().unwrap()[0x2000], 0xAA);
        p.mem.as_mut().unwrap()[0x2001] = 0xCC;
    }
    assert_eq!(table.find(child).unwrap().mem.as_ref().unwrap()[0x2001], 0);
}

#[test]
fn fork_fails_without_free_slot() {
    let mut table = ProcessTable::new();
    let mut pids = Vec::new();
    for _ in 1..MAX_PROCESSES {
        pids.push(table.fork(INIT_PID).unwrap());
    }
    assert_eq!(table.fork(INIT_PID), Err(Errno::ENOSPC));

    let expected: Vec<u32> = (1..MAX_PROCESSES as u32)
        .map(|slot| slot + MAX_PROCESSES as u32)
        .collect();
    assert_eq!(pids, expected);
}

#[test]
fn exited_processes_hold_their_slot_until_reaped() {
    let mut table = ProcessTable::new();
    let first = table.fork(INIT_PID).unwrap();
    table.find_mut(first).unwrap().exit(0);

    let second = table.fork(INIT_PID).unwrap();
    assert_ne!(first, second);

    table.reap(first).unwrap();
    assert_eq!(table.fork(INIT_PID), Ok(first));
}

#[test]
fn fork_of_missing_or_dead_parent() {
    let mut table = ProcessTable::new();
    assert_eq!(table.fork(99), Err(Errno::ENOENT));

    let child = table.fork(INIT_PID).unwrap();
    table.find_mut(child).unwrap().exit(1);
    assert_eq!(table.fork(child), Err(Errno::ENOENT));
}

#[test]
fn children_can_fork() {
    let mut table = ProcessTable::new();
    let child = table.fork(INIT_PID).unwrap();
    let grandchild = table.fork(child).unwrap();
    assert_eq!(table.find(grandchild).unwrap().ppid, child);
    assert_eq!(table.alive_pids(), vec![INIT_PID, child, grandchild]);
    assert_eq!(table.highest_alive_pid(), Some(grandchild));
}
