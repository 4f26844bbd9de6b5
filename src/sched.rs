//! Cooperative round-robin scheduler.
//!
//! Processes run until they give up the processor, either explicitly or while blocked in a
//! syscall. The next process is the first runnable slot after the current one, wrapping around
//! the table; the idle process runs only when no slot is runnable.

use crate::{arch::Hart, config::PROCS_MAX, console::Console, kernel::Kernel, proc::Pid};

impl<H, C> Kernel<'_, H, C>
where
    H: Hart,
    C: Console,
{
    /// Returns the process the next yield will switch to.
    ///
    /// The scan starts at the slot following the current process (slot 0 for the idle process)
    /// and covers the whole table, so the current process is considered last.
    pub fn pick_next(&self) -> Pid {
        let start = self.current.slot().map_or(0, |slot| slot + 1);

        (0..PROCS_MAX)
            .map(|i| Pid::from_slot((start + i) % PROCS_MAX))
            .find(|&pid| self.procs.get(pid).is_runnable())
            .unwrap_or(Pid::IDLE)
    }

    /// Gives up the processor to the next runnable process.
    ///
    /// Returns immediately if the current process is the only candidate. Otherwise installs the
    /// next address space, arms the trap stack of the next process and switches to it; the
    /// call returns once some later yield switches back to the caller.
    ///
    /// # Safety
    ///
    /// `this` must point to a valid kernel. The process switched to will access the kernel in
    /// turn, so the caller must not hold any reference into it across this call.
    pub unsafe fn yield_now(this: *mut Self)
    where
        H: Copy,
    {
        // SAFETY: the borrow ends before the switch
        let Some((hart, prev_sp, next_sp)) = (unsafe { &mut *this }).prepare_switch() else {
            return;
        };

        // SAFETY: both pointers refer to slots of the process table, which outlives every
        // process. `next_sp` was either prepared at creation or stored by a previous switch.
        // Nothing borrowed from the kernel is held across the switch.
        unsafe { hart.switch_context(prev_sp, next_sp) };
    }

    /// Picks the next process and installs everything but its registers.
    ///
    /// Returns the hart and the stack pointer slots to switch with, or `None` if the current
    /// process keeps running.
    fn prepare_switch(&mut self) -> Option<(H, *mut usize, *const usize)>
    where
        H: Copy,
    {
        let prev = self.current;
        let next = self.pick_next();
        if next == prev {
            return None;
        }

        let (root, stack_top) = {
            let proc = self.procs.get(next);
            (proc.page_table(), proc.stack_top())
        };

        log::trace!("switching from {} to {}", prev, next);

        self.hart.activate_address_space(root);
        self.hart.set_trap_stack(stack_top);
        self.current = next;

        let (prev_sp, next_sp) = self.procs.switch_slots(prev, next);
        Some((self.hart, prev_sp, next_sp))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::USER_BASE,
        console::Console,
        proc::ProcessTable,
        syscall::Sysno,
        testing::{HartEvent, HostRam, MockConsole, MockHart, SingleContext},
        trap::{TrapCause, TrapFrame, TrapInfo},
    };

    use super::*;

    fn spawn<H: Hart, C: Console>(kernel: &mut Kernel<'_, H, C>, n: usize) -> Vec<Pid> {
        (0..n)
            .map(|_| kernel.create_process(0x8020_1000, None).unwrap())
            .collect()
    }

    #[test]
    fn round_robin_from_any_process() {
        const K: usize = 5;

        for i in 0..K {
            let ram = HostRam::new(64);
            let mut procs = Box::new(ProcessTable::new());
            let (hart, console) = (MockHart::new(), MockConsole::new());
            let mut kernel =
                Kernel::new(&mut procs, ram.allocator(), ram.layout(), &hart, &console);
            let pids = spawn(&mut kernel, K);

            kernel.current = pids[i];

            let visited: Vec<_> = (0..K)
                .map(|_| {
                    kernel.yield_now();
                    kernel.current()
                })
                .collect();
            let expected: Vec<_> = (1..=K).map(|n| pids[(i + n) % K]).collect();

            assert_eq!(visited, expected);
            assert_eq!(hart.switches(), K);
        }
    }

    #[test]
    fn first_yield_from_idle_picks_lowest_slot() {
        let ram = HostRam::new(64);
        let mut procs = Box::new(ProcessTable::new());
        let (hart, console) = (MockHart::new(), MockConsole::new());
        let mut kernel = Kernel::new(&mut procs, ram.allocator(), ram.layout(), &hart, &console);
        let pids = spawn(&mut kernel, 3);

        assert_eq!(kernel.pick_next(), pids[0]);
        kernel.yield_now();
        assert_eq!(kernel.current(), pids[0]);
    }

    #[test]
    fn switch_effects_are_ordered() {
        let ram = HostRam::new(64);
        let mut procs = Box::new(ProcessTable::new());
        let (hart, console) = (MockHart::new(), MockConsole::new());
        let mut kernel = Kernel::new(&mut procs, ram.allocator(), ram.layout(), &hart, &console);
        let pid = spawn(&mut kernel, 1)[0];

        kernel.yield_now();

        let proc = kernel.processes().get(pid);
        let events = hart.take();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], HartEvent::AddressSpace(proc.page_table()));
        assert_eq!(events[1], HartEvent::TrapStack(proc.stack_top()));
        assert!(matches!(events[2], HartEvent::Switch { .. }));
    }

    #[test]
    fn switch_saves_into_previous_and_loads_from_next() {
        let ram = HostRam::new(64);
        let mut procs = Box::new(ProcessTable::new());
        let (hart, console) = (MockHart::new(), MockConsole::new());
        let mut kernel = Kernel::new(&mut procs, ram.allocator(), ram.layout(), &hart, &console);
        let pids = spawn(&mut kernel, 2);

        kernel.yield_now();
        kernel.yield_now();

        let idle_sp = kernel.procs.saved_sp_ptr(Pid::IDLE) as usize;
        let a_sp = kernel.procs.saved_sp_ptr(pids[0]) as usize;
        let b_sp = kernel.procs.saved_sp_ptr(pids[1]) as usize;

        let switches: Vec<_> = hart
            .take()
            .into_iter()
            .filter(|e| matches!(e, HartEvent::Switch { .. }))
            .collect();
        assert_eq!(
            switches,
            [
                HartEvent::Switch { prev: idle_sp, next: a_sp },
                HartEvent::Switch { prev: a_sp, next: b_sp },
            ]
        );
    }

    #[test]
    fn lone_process_yield_is_a_no_op() {
        let ram = HostRam::new(64);
        let mut procs = Box::new(ProcessTable::new());
        let (hart, console) = (MockHart::new(), MockConsole::new());
        let mut kernel = Kernel::new(&mut procs, ram.allocator(), ram.layout(), &hart, &console);
        let pid = spawn(&mut kernel, 1)[0];

        kernel.yield_now();
        hart.take();

        for _ in 0..3 {
            kernel.yield_now();
            assert_eq!(kernel.current(), pid);
        }
        assert!(hart.take().is_empty());
    }

    #[test]
    fn idle_only_when_nothing_is_runnable() {
        let ram = HostRam::new(64);
        let mut procs = Box::new(ProcessTable::new());
        let (hart, console) = (MockHart::new(), MockConsole::new());
        let mut kernel = Kernel::new(&mut procs, ram.allocator(), ram.layout(), &hart, &console);
        let pids = spawn(&mut kernel, 2);

        kernel.yield_now();
        kernel.procs.get_mut(pids[0]).exit();

        // B is still runnable, so idle is skipped
        kernel.yield_now();
        assert_eq!(kernel.current(), pids[1]);
        kernel.yield_now();
        assert_eq!(kernel.current(), pids[1]);

        kernel.procs.get_mut(pids[1]).exit();
        hart.take();
        kernel.yield_now();
        assert_eq!(kernel.current(), Pid::IDLE);

        let idle = kernel.processes().get(Pid::IDLE);
        let events = hart.take();
        assert_eq!(events[0], HartEvent::AddressSpace(None));
        assert_eq!(events[1], HartEvent::TrapStack(idle.stack_top()));

        // Nothing left to run: idle keeps the processor
        kernel.yield_now();
        assert_eq!(kernel.current(), Pid::IDLE);
        assert!(hart.take().is_empty());
    }

    #[test]
    fn two_processes_alternate() {
        let ram = HostRam::new(64);
        let mut procs = Box::new(ProcessTable::new());
        let (hart, console) = (MockHart::new(), MockConsole::new());
        let mut kernel = Kernel::new(&mut procs, ram.allocator(), ram.layout(), &hart, &console);
        let pids = spawn(&mut kernel, 2);

        // Boot context hands over to the first process
        kernel.yield_now();

        // Each process body: write its letter through the syscall ABI, then yield
        for _ in 0..8 {
            let letter = if kernel.current() == pids[0] { b'A' } else { b'B' };
            let mut frame = TrapFrame {
                a0: letter as usize,
                a3: Sysno::PutChar as usize,
                ..Default::default()
            };
            let info = TrapInfo {
                cause: TrapCause::EnvCallFromU,
                tval: 0,
                epc: USER_BASE as usize,
            };

            assert_eq!(
                kernel.handle_trap(&mut frame, info),
                Ok(USER_BASE as usize + 4)
            );
            kernel.yield_now();
        }

        assert_eq!(console.output(), b"ABABABAB");
        assert_eq!(hart.switches(), 9);
    }
}
