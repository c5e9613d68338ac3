//! Interactive value entry: text prompts through `dialoguer`, with a
//! nested selection picker for types that have no text form.

use dialoguer::{theme::ColorfulTheme, Input, Select};
use ferroscope_inspect::{
    Canceled, NodeKind, ParseOutcome, PromptContext, StructuralEdit, ValuePrompt,
};
use ferroscope_reflect::{TypeId, Value};

pub struct ConsolePrompt;

impl ConsolePrompt {
    fn ask(
        &self,
        ctx: &PromptContext<'_>,
        required: TypeId,
        display_name: &str,
        current: &str,
    ) -> Result<Value, Canceled> {
        // Class-typed requests skip straight to the selection flow.
        if let Ok(ParseOutcome::NeedsSelection(target)) = ctx.parse_text(required, "") {
            return self.pick(ctx, target);
        }

        let theme = ColorfulTheme::default();
        loop {
            let prompt = format!("{display_name} ({})", ctx.registry().name(required));
            // The theme has to outlive the builder since `Input` only borrows it.
            let mut input = Input::<String>::with_theme(&theme)
                .with_prompt(prompt)
                .allow_empty(true);
            if !current.is_empty() {
                input = input.with_initial_text(current.to_string());
            }
            let text = input.interact_text().map_err(|_| Canceled)?;

            match ctx.parse_text(required, &text) {
                Ok(ParseOutcome::Parsed(value)) => return Ok(value),
                Ok(ParseOutcome::NeedsSelection(target)) => return self.pick(ctx, target),
                Err(error) => {
                    eprintln!("{error}");
                }
            }
        }
    }

    /// Nested modal selection: expand the root graph constrained to the
    /// target type and pick one assignable value row.
    fn pick(&self, ctx: &PromptContext<'_>, target: TypeId) -> Result<Value, Canceled> {
        let mut session = ctx.selection_session(target);
        let mut view = crate::view::ConsoleView::new();
        session.refresh(&mut view).map_err(|_| Canceled)?;

        let candidates: Vec<_> = session
            .tree()
            .preorder()
            .into_iter()
            .filter(|id| {
                matches!(session.tree().kind(*id), NodeKind::Value(_))
                    && session.accept(*id).is_ok()
            })
            .collect();
        if candidates.is_empty() {
            return Err(Canceled);
        }

        let labels: Vec<String> = candidates
            .iter()
            .map(|id| session.node_label(*id))
            .collect();
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("pick a {}", session.title()))
            .items(&labels)
            .default(0)
            .interact_opt()
            .map_err(|_| Canceled)?
            .ok_or(Canceled)?;

        session.accept(candidates[choice]).map_err(|_| Canceled)
    }
}

impl ValuePrompt for ConsolePrompt {
    fn value_for(
        &mut self,
        ctx: &PromptContext<'_>,
        required: TypeId,
        display_name: &str,
        current: &str,
    ) -> Result<Value, Canceled> {
        self.ask(ctx, required, display_name, current)
    }
}

impl StructuralEdit for ConsolePrompt {
    fn replacement(
        &mut self,
        ctx: &PromptContext<'_>,
        required: TypeId,
        display_name: &str,
        current: &str,
    ) -> Result<Value, Canceled> {
        self.ask(ctx, required, display_name, current)
    }
}

#[cfg(test)]
mod tests {
    use dialoguer::{theme::ColorfulTheme, Input};

    // Mirrors the builder shape in `ask`: the input is reassigned after
    // construction, so the theme it borrows must be a named binding.
    #[test]
    fn test_input_builder_survives_reassignment() {
        let theme = ColorfulTheme::default();
        let mut input = Input::<String>::with_theme(&theme)
            .with_prompt("size (Int32)")
            .allow_empty(true);
        input = input.with_initial_text("42".to_string());
        drop(input);
    }
}
