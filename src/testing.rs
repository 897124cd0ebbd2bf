//! Test doubles for the host runtime and the wall clock

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{Result, bail};

use crate::events::EventSender;
use crate::input_gate::{InputVerdict, KeyInput};
use crate::schedule::WallClock;
use crate::surface::{DisplaySurface, HostRuntime, SurfaceOptions, WindowOpenDecision};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Load(String),
    Reload,
    InjectStyle(String),
    Input(KeyInput, InputVerdict),
    WindowOpen(String, WindowOpenDecision),
    Close,
}

/// Shared record of everything the controller asked the surface to do
#[derive(Debug, Clone, Default)]
pub struct SurfaceLog(Rc<RefCell<Vec<SurfaceCall>>>);

impl SurfaceLog {
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.0.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.0.borrow().iter().filter(|call| pred(call)).count()
    }

    pub fn reloads(&self) -> usize {
        self.count(|call| *call == SurfaceCall::Reload)
    }

    pub fn loads(&self) -> usize {
        self.count(|call| matches!(call, SurfaceCall::Load(_)))
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, call: SurfaceCall) {
        self.0.borrow_mut().push(call);
    }
}

pub struct FakeSurface {
    log: SurfaceLog,
    fail_inject: bool,
    panic_inject: bool,
}

impl DisplaySurface for FakeSurface {
    fn load(&mut self, url: &str) -> Result<()> {
        self.log.push(SurfaceCall::Load(url.to_string()));
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.log.push(SurfaceCall::Reload);
        Ok(())
    }

    fn inject_style(&mut self, stylesheet: &str) -> Result<()> {
        self.log.push(SurfaceCall::InjectStyle(stylesheet.to_string()));
        if self.panic_inject {
            panic!("renderer crashed during style injection");
        }
        if self.fail_inject {
            bail!("renderer rejected style sheet");
        }
        Ok(())
    }

    fn resolve_input(&mut self, input: &KeyInput, verdict: InputVerdict) {
        self.log.push(SurfaceCall::Input(input.clone(), verdict));
    }

    fn resolve_window_open(&mut self, url: &str, decision: WindowOpenDecision) {
        self.log.push(SurfaceCall::WindowOpen(url.to_string(), decision));
    }

    fn close(&mut self) {
        self.log.push(SurfaceCall::Close);
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub log: SurfaceLog,
    pub created: Rc<Cell<usize>>,
    pub fail_inject: bool,
    pub panic_inject: bool,
    pub fail_create: bool,
}

impl HostRuntime for FakeHost {
    type Surface = FakeSurface;

    fn create_surface(
        &mut self,
        _options: &SurfaceOptions,
        _events: EventSender,
    ) -> Result<FakeSurface> {
        if self.fail_create {
            bail!("display server unavailable");
        }
        self.created.set(self.created.get() + 1);
        Ok(FakeSurface {
            log: self.log.clone(),
            fail_inject: self.fail_inject,
            panic_inject: self.panic_inject,
        })
    }
}

/// Wall clock pinned to a settable hour that counts its reads
#[derive(Debug, Clone, Default)]
pub struct FixedClock {
    pub hour: Rc<Cell<u32>>,
    pub reads: Rc<Cell<usize>>,
}

impl FixedClock {
    pub fn at(hour: u32) -> Self {
        let clock = Self::default();
        clock.hour.set(hour);
        clock
    }
}

impl WallClock for FixedClock {
    fn local_hour(&self) -> u32 {
        self.reads.set(self.reads.get() + 1);
        self.hour.get()
    }
}
