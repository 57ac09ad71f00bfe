//! Compiled-in seed documents for a fresh session.
//!
//! Used whenever a storage key is absent on cold start; the store writes
//! them back immediately so the next start finds real values.

pub const DEFAULT_SCRIPT: &str = r#"data = {
  title = "Welcome to EJSLab",
  subtitle = "A live template workbench",
  users = {
    { name = "Alice", age = 25 },
    { name = "Bob", age = 30 },
    { name = "Charlie", age = 35 },
  },
  features = { "Dynamic content", "Loops & conditionals", "Partials support" },
}
"#;

pub const DEFAULT_TEMPLATE: &str = r#"<div class="container">
  <header>
    <h1><%= title %></h1>
    <p class="subtitle"><%= subtitle %></p>
  </header>

  <section class="features">
    <h2>Key Features</h2>
    <ul>
      <% for _, feature in ipairs(features) do %>
        <li><%= feature %></li>
      <% end %>
    </ul>
  </section>

  <section class="users">
    <h2>Users</h2>
    <div class="user-grid">
      <% for _, user in ipairs(users) do %>
        <div class="user-card">
          <h3><%= user.name %></h3>
          <p>Age: <%= user.age %></p>
          <% if user.age >= 30 then %>
            <span class="badge senior">Senior</span>
          <% else %>
            <span class="badge junior">Junior</span>
          <% end %>
        </div>
      <% end %>
    </div>
  </section>
</div>

<style>
  .container { max-width: 800px; margin: 0 auto; padding: 20px; font-family: Arial, sans-serif; }
  header { text-align: center; margin-bottom: 30px; }
  .subtitle { color: #666; font-size: 18px; }
  .features li { background: #f0f0f0; margin: 5px 0; padding: 10px; border-radius: 5px; }
  .user-card { background: #fff; border: 1px solid #ddd; padding: 15px; border-radius: 8px; }
  .badge { padding: 4px 8px; border-radius: 12px; font-size: 12px; font-weight: bold; }
  .senior { background: #4CAF50; color: white; }
  .junior { background: #2196F3; color: white; }
</style>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::template::TemplateEngine;

    #[test]
    fn test_defaults_render_cleanly() {
        let ctx = evaluate(DEFAULT_SCRIPT).expect("default script must evaluate");
        let html = TemplateEngine::new()
            .render(DEFAULT_TEMPLATE, &ctx)
            .expect("default template must render");
        assert!(html.contains("Welcome to EJSLab"));
        assert!(html.contains("Alice"));
        assert!(html.contains("Senior"));
        assert!(html.contains("Junior"));
    }
}
