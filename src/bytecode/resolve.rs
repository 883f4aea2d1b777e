use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::bytecode::{
    Instruction, Known, Macro, Op, Program,
    resolve_error::{DefKind, ResolveError},
};

/// Upper bound on nested macro expansion; a macro that (indirectly) expands
/// to itself hits this instead of looping forever.
pub const MAX_MACRO_DEPTH: usize = 64;

/// Links a flat instruction list into an executable [`Program`].
///
/// Resolution is two passes over one instruction arena:
/// 1. a forward scan that splices macros, matches blocks and records
///    procedure entries, leaving other names as pending call sites
/// 2. a binding pass that turns every pending call site into a `ProcCall`
///
/// Procedures may therefore be called before they are defined; macros may not.
pub struct Resolver {
    /// Output arena. Indices recorded in `blocks` and `call_sites` stay valid.
    program: Vec<Instruction>,

    /// Instructions still to scan, with their macro expansion depth.
    input: VecDeque<(Instruction, usize)>,

    /// Indices of openers waiting for their closer.
    blocks: Vec<usize>,

    /// Names in definition order.
    known: HashMap<String, Known>,

    /// Indices of identifiers that were not macros when scanned.
    call_sites: Vec<usize>,

    in_proc: bool,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            program: Vec::new(),
            input: VecDeque::new(),
            blocks: Vec::new(),
            known: HashMap::new(),
            call_sites: Vec::new(),
            in_proc: false,
        }
    }

    pub fn resolve(mut self, instrs: Vec<Instruction>) -> Result<Program, ResolveError> {
        self.input = instrs.into_iter().map(|instr| (instr, 0)).collect();

        while let Some((instr, depth)) = self.input.pop_front() {
            self.scan(instr, depth)?;
        }

        self.bind_call_sites()?;

        if let Some(&outermost) = self.blocks.first() {
            let opener = &self.program[outermost];
            return Err(ResolveError::unclosed_block(&opener.op, &opener.loc));
        }

        debug!(
            instructions = self.program.len(),
            names = self.known.len(),
            "program resolved"
        );

        Ok(Program::new(self.program))
    }

    // =========================================================================
    // Pass 1: block matching, macro splicing, procedure table
    // =========================================================================

    fn scan(&mut self, mut instr: Instruction, depth: usize) -> Result<(), ResolveError> {
        let i = self.program.len();

        match &instr.op {
            Op::If | Op::While => self.blocks.push(i),

            Op::Else => {
                let start = self
                    .blocks
                    .pop()
                    .filter(|&start| self.program[start].op == Op::If)
                    .ok_or_else(|| ResolveError::UnmatchedElse {
                        loc: instr.loc.clone(),
                    })?;
                // taken `if` branch resumes past the else
                self.program[start].jump = Some(i + 1);
                self.blocks.push(i);
            }

            Op::Do => {
                let start = self
                    .blocks
                    .pop()
                    .filter(|&start| self.program[start].op == Op::While)
                    .ok_or_else(|| ResolveError::UnmatchedDo {
                        loc: instr.loc.clone(),
                    })?;
                // parked here until the matching `end` takes it
                instr.jump = Some(start);
                self.blocks.push(i);
            }

            Op::End => self.close_block(&mut instr, i)?,

            Op::ProcDef => self.define_procedure(&instr, i)?,

            Op::MacroDef => {
                self.define_macro(&instr)?;
                return Ok(());
            }

            Op::Ident(name) => {
                if let Some(Known::Macro(m)) = self.known.get(name) {
                    if depth >= MAX_MACRO_DEPTH {
                        return Err(ResolveError::MacroTooDeep {
                            name: name.clone(),
                            limit: MAX_MACRO_DEPTH,
                            loc: instr.loc.clone(),
                        });
                    }
                    debug!(name = %name, len = m.body.len(), depth, "expanding macro");
                    for body_instr in m.body.iter().rev() {
                        self.input.push_front((body_instr.clone(), depth + 1));
                    }
                    return Ok(());
                }
                self.call_sites.push(i);
            }

            _ => {}
        }

        self.program.push(instr);
        Ok(())
    }

    fn close_block(&mut self, end: &mut Instruction, i: usize) -> Result<(), ResolveError> {
        let start = self.blocks.pop().ok_or_else(|| ResolveError::UnmatchedEnd {
            loc: end.loc.clone(),
        })?;

        let opener = self.program[start].op.clone();
        match opener {
            Op::If | Op::Else => {
                self.program[start].jump = Some(i);
                end.jump = Some(i + 1);
            }
            Op::Do => {
                // loop back-edge to the `while`, exit past this `end`
                end.jump = self.program[start].jump;
                self.program[start].jump = Some(i + 1);
            }
            Op::ProcDef => {
                self.in_proc = false;
                self.program[start].jump = Some(i + 1);
                end.op = Op::ProcRet;
            }
            other => {
                return Err(ResolveError::unreachable_end(
                    &other,
                    &self.program[start].loc,
                    &end.loc,
                ));
            }
        }

        Ok(())
    }

    fn define_procedure(&mut self, marker: &Instruction, i: usize) -> Result<(), ResolveError> {
        let Some((next, _)) = self.input.front_mut() else {
            return Err(ResolveError::EmptyDefinition {
                kind: DefKind::Procedure,
                loc: marker.loc.clone(),
            });
        };
        let Op::Ident(name) = &next.op else {
            return Err(ResolveError::NameNotIdentifier {
                kind: DefKind::Procedure,
                loc: marker.loc.clone(),
            });
        };
        let name = name.clone();

        if self.known.contains_key(&name) {
            return Err(ResolveError::DuplicateIdentifier {
                name,
                loc: next.loc.clone(),
            });
        }
        if self.in_proc {
            return Err(ResolveError::NestedProcedure {
                loc: marker.loc.clone(),
            });
        }

        self.in_proc = true;
        self.blocks.push(i);
        // the name is scanned next and lands at i + 1
        next.op = Op::ProcBegin(name.clone());
        self.known.insert(name, Known::Procedure { entry: i + 1 });

        Ok(())
    }

    fn define_macro(&mut self, marker: &Instruction) -> Result<(), ResolveError> {
        let Some((name_instr, _)) = self.input.pop_front() else {
            return Err(ResolveError::EmptyDefinition {
                kind: DefKind::Macro,
                loc: marker.loc.clone(),
            });
        };
        let Op::Ident(name) = name_instr.op else {
            return Err(ResolveError::NameNotIdentifier {
                kind: DefKind::Macro,
                loc: marker.loc.clone(),
            });
        };

        if self.known.contains_key(&name) {
            return Err(ResolveError::DuplicateIdentifier {
                name,
                loc: name_instr.loc,
            });
        }

        // body is captured raw: nested openers and closers are not matched
        let mut body = Vec::new();
        loop {
            match self.input.pop_front() {
                Some((next, _)) if next.op == Op::End => break,
                Some((next, _)) => body.push(next),
                None => {
                    return Err(ResolveError::UnclosedMacro {
                        name,
                        loc: marker.loc.clone(),
                    });
                }
            }
        }

        debug!(name = %name, len = body.len(), "macro defined");
        self.known.insert(
            name,
            Known::Macro(Macro {
                loc: marker.loc.clone(),
                body,
            }),
        );

        Ok(())
    }

    // =========================================================================
    // Pass 2: call-site binding
    // =========================================================================

    fn bind_call_sites(&mut self) -> Result<(), ResolveError> {
        for site in std::mem::take(&mut self.call_sites) {
            let instr = &mut self.program[site];
            let Op::Ident(name) = &instr.op else {
                continue;
            };
            let name = name.clone();

            match self.known.get(&name) {
                Some(Known::Procedure { entry }) => {
                    instr.jump = Some(*entry);
                    instr.op = Op::ProcCall(name);
                }
                Some(Known::Macro(_)) => {
                    return Err(ResolveError::MacroUsedBeforeDefinition {
                        name,
                        loc: instr.loc.clone(),
                    });
                }
                None => {
                    return Err(ResolveError::UndefinedIdentifier {
                        name,
                        loc: instr.loc.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Resolve with a fresh [`Resolver`].
pub fn resolve(instrs: Vec<Instruction>) -> Result<Program, ResolveError> {
    Resolver::new().resolve(instrs)
}
